//! `enigo` + `arboard` adapter implementing [`TextInjector`].

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

use super::injector::{OutputMode, TextInjector};

const RETURN_PRE_DELAY_MS: u64 = 50;
const RETURN_INTRA_PRESS_GAP_MS: u64 = 10;
const CLIPBOARD_RESTORE_DELAY_MS: u64 = 500;
const MIN_TYPE_SPEED_MS: u64 = 1;

#[cfg(target_os = "macos")]
const PASTE_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const PASTE_MODIFIER: Key = Key::Control;

pub struct EnigoInjector {
    enigo: Mutex<Enigo>,
}

impl EnigoInjector {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn type_text(&self, text: &str, type_speed_ms: u64) -> Result<()> {
        let delay = type_speed_ms.max(MIN_TYPE_SPEED_MS);
        let mut enigo = self.enigo.lock().unwrap();
        for ch in text.chars() {
            enigo
                .text(&ch.to_string())
                .map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;
            thread::sleep(Duration::from_millis(delay));
        }
        Ok(())
    }

    fn paste_text(&self, text: &str, restore_clipboard: bool) -> Result<()> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;

        let previous = if restore_clipboard {
            clipboard.get_text().ok()
        } else {
            None
        };

        clipboard
            .set_text(text.to_string())
            .map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;

        {
            let mut enigo = self.enigo.lock().unwrap();
            enigo
                .key(PASTE_MODIFIER, Direction::Press)
                .map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;
            enigo
                .key(Key::Unicode('v'), Direction::Click)
                .map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;
            enigo
                .key(PASTE_MODIFIER, Direction::Release)
                .map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;
        }

        if let Some(previous) = previous {
            thread::sleep(Duration::from_millis(CLIPBOARD_RESTORE_DELAY_MS));
            if let Err(e) = clipboard.set_text(previous) {
                warn!("failed to restore clipboard: {}", e);
            }
        }

        Ok(())
    }
}

impl TextInjector for EnigoInjector {
    fn inject(&self, text: &str, mode: OutputMode, type_speed_ms: u64) -> Result<()> {
        debug!("injecting {} chars via {:?}", text.chars().count(), mode);
        match mode {
            OutputMode::Type => self.type_text(text, type_speed_ms),
            OutputMode::Paste { restore_clipboard } => self.paste_text(text, restore_clipboard),
        }
    }

    fn press_return(&self) -> Result<()> {
        thread::sleep(Duration::from_millis(RETURN_PRE_DELAY_MS));
        let mut enigo = self.enigo.lock().unwrap();
        enigo
            .key(Key::Return, Direction::Press)
            .map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;
        thread::sleep(Duration::from_millis(RETURN_INTRA_PRESS_GAP_MS));
        enigo
            .key(Key::Return, Direction::Release)
            .map_err(|e| PipelineError::InjectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_speed_is_clamped_to_minimum() {
        assert_eq!(1u64.max(MIN_TYPE_SPEED_MS), 1);
        assert_eq!(0u64.max(MIN_TYPE_SPEED_MS), 1);
    }
}
