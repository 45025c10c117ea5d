//! Persisted settings. Copy-in, copy-out value: the Pipeline is the sole
//! writer of runtime VAD state, and re-derives it from a `Settings` each
//! time one is pushed in via `apply_vad_settings`. No observer framework.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::output::OutputMode;
use crate::transcription::SamplingStrategy;
use crate::vad::VadConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionMode {
    Buffered,
    Continuous,
}

impl Default for TranscriptionMode {
    fn default() -> Self {
        Self::Buffered
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    pub primary_key: String,
    pub send_key: String,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            primary_key: "F13".to_string(),
            send_key: "F14".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub schema_version: u32,

    pub vad: VadConfig,
    pub sampling: SamplingStrategy,
    pub use_gpu: bool,
    pub language: String,
    pub initial_prompt: Option<String>,
    pub output_mode: OutputMode,
    pub hotkeys: HotkeySettings,
    pub transcription_mode: TranscriptionMode,

    pub release_delay_ms: u32,
    pub keep_mic_warm: bool,
    pub send_return_delay_ms: u32,
    pub type_speed_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            vad: VadConfig::default(),
            sampling: SamplingStrategy::default(),
            use_gpu: false,
            language: "en".to_string(),
            initial_prompt: None,
            output_mode: OutputMode::Type,
            hotkeys: HotkeySettings::default(),
            transcription_mode: TranscriptionMode::default(),
            release_delay_ms: 300,
            keep_mic_warm: false,
            send_return_delay_ms: 200,
            type_speed_ms: 5,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, falling back to defaults if the file
    /// doesn't exist. Unknown keys are ignored by serde; any key missing
    /// from the file (e.g. a field added in a newer schema version) is
    /// filled in from `Settings::default()` via `#[serde(default)]`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            crate::error::PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        Ok(home.join(".holdtotalk"))
    }

    pub fn default_settings_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("settings.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_settings_match_spec_constants() {
        let settings = Settings::default();
        assert_eq!(settings.release_delay_ms, 300);
        assert_eq!(settings.send_return_delay_ms, 200);
        assert!(!settings.keep_mic_warm);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.schema_version, 1);
    }

    #[test]
    fn load_fills_missing_keys_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"language": "de", "unknown_future_key": 42}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.language, "de");
        assert_eq!(settings.release_delay_ms, 300);
        assert_eq!(settings.send_return_delay_ms, 200);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut original = Settings::default();
        original.language = "fr".to_string();
        original.vad.speech_threshold = 0.03;
        original.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.language, "fr");
        assert_eq!(loaded.vad.speech_threshold, 0.03);
    }
}
