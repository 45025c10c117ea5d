use crate::error::Result;

/// Platform key identifier. Re-exported from `rdev` since that's the only
/// adapter in this crate; a second platform backend would introduce its
/// own newtype instead of widening this one.
pub type KeyCode = rdev::Key;

pub type KeyCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Global hotkey capture. Implementations must deduplicate autorepeat: a
/// key-down while the tracked key is already down is ignored, and the
/// `is_send` flag passed to `on_key_up` reflects whichever key triggered
/// the most recent `on_key_down`.
pub trait InputHook: Send {
    fn set_key_codes(&mut self, primary: KeyCode, send: KeyCode);
    fn set_callbacks(&mut self, on_key_down: KeyCallback, on_key_up: KeyCallback);
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
}

/// Maps the handful of key names `Settings` persists to `rdev::Key`
/// variants. Settings stores names rather than `rdev::Key` directly since
/// the latter has no stable serde representation.
pub fn parse_key_name(name: &str) -> Option<KeyCode> {
    use rdev::Key::*;
    Some(match name {
        "F13" => F13,
        "F14" => F14,
        "F15" => F15,
        "F16" => F16,
        "F17" => F17,
        "F18" => F18,
        "F19" => F19,
        "CapsLock" => CapsLock,
        "ControlLeft" => ControlLeft,
        "ControlRight" => ControlRight,
        "AltLeft" => Alt,
        "AltRight" => AltGr,
        "ShiftLeft" => ShiftLeft,
        "ShiftRight" => ShiftRight,
        "MetaLeft" => MetaLeft,
        "MetaRight" => MetaRight,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_name_recognizes_common_ptt_keys() {
        assert_eq!(parse_key_name("F13"), Some(rdev::Key::F13));
        assert_eq!(parse_key_name("unknown-key"), None);
    }
}
