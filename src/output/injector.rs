use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How dispatched text reaches the focused application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OutputMode {
    /// Emit synthetic key events carrying Unicode character payloads.
    Type,
    /// Set the clipboard and emit the platform paste chord.
    Paste { restore_clipboard: bool },
}

/// Simulates typing or clipboard paste, and a trailing Return keystroke for
/// the "Talk + Send" variant. Implementations must use an empty modifier
/// mask for typing and the platform's paste chord for pasting; the caller
/// never controls modifier state directly.
pub trait TextInjector: Send + Sync {
    fn inject(&self, text: &str, mode: OutputMode, type_speed_ms: u64) -> Result<()>;

    /// Synthesizes a Return key press-and-release, with a 50ms pre-delay
    /// and a small intra-press gap.
    fn press_return(&self) -> Result<()>;
}
