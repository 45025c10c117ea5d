//! Error kinds shared across the pipeline. Each variant names where it
//! originates and how the caller is expected to react: surfaced,
//! logged-and-swallowed, or returned as an empty result.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no input audio device available")]
    NoInputDevice,

    #[error("failed to load model from {path:?}: {reason}")]
    ModelLoadFailed { path: PathBuf, reason: String },

    #[error("transcription failed (code {code})")]
    TranscribeFailed { code: i32 },

    #[error("hotkey permission denied")]
    HotkeyPermissionDenied,

    #[error("text injection failed: {0}")]
    InjectionFailed(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
