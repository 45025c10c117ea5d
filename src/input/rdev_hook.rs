//! `rdev`-based global hotkey capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use rdev::EventType;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

use super::hook::{InputHook, KeyCallback, KeyCode};

pub struct RdevHook {
    primary: Arc<Mutex<Option<KeyCode>>>,
    send: Arc<Mutex<Option<KeyCode>>>,
    on_key_down: Arc<Mutex<Option<KeyCallback>>>,
    on_key_up: Arc<Mutex<Option<KeyCallback>>>,
    active: Arc<AtomicBool>,
    down_is_send: Arc<Mutex<Option<bool>>>,
    handle: Option<JoinHandle<()>>,
}

impl RdevHook {
    pub fn new() -> Self {
        Self {
            primary: Arc::new(Mutex::new(None)),
            send: Arc::new(Mutex::new(None)),
            on_key_down: Arc::new(Mutex::new(None)),
            on_key_up: Arc::new(Mutex::new(None)),
            active: Arc::new(AtomicBool::new(false)),
            down_is_send: Arc::new(Mutex::new(None)),
            handle: None,
        }
    }
}

impl Default for RdevHook {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHook for RdevHook {
    fn set_key_codes(&mut self, primary: KeyCode, send: KeyCode) {
        *self.primary.lock().unwrap() = Some(primary);
        *self.send.lock().unwrap() = Some(send);
    }

    fn set_callbacks(&mut self, on_key_down: KeyCallback, on_key_up: KeyCallback) {
        *self.on_key_down.lock().unwrap() = Some(on_key_down);
        *self.on_key_up.lock().unwrap() = Some(on_key_up);
    }

    fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let primary = self.primary.clone();
        let send = self.send.clone();
        let on_key_down = self.on_key_down.clone();
        let on_key_up = self.on_key_up.clone();
        let active = self.active.clone();
        let down_is_send = self.down_is_send.clone();

        let (ready_tx, ready_rx) = mpsc::sync_channel::<std::result::Result<(), ()>>(1);
        active.store(true, Ordering::SeqCst);

        let handle = std::thread::spawn(move || {
            let callback = move |event: rdev::Event| {
                if !active.load(Ordering::Relaxed) {
                    return;
                }
                match event.event_type {
                    EventType::KeyPress(key) => {
                        handle_key_down(key, &primary, &send, &down_is_send, &on_key_down)
                    }
                    EventType::KeyRelease(key) => {
                        handle_key_up(key, &primary, &send, &down_is_send, &on_key_up)
                    }
                    _ => {}
                }
            };

            if let Err(e) = rdev::listen(callback) {
                warn!("hotkey listener failed: {:?}", e);
                let _ = ready_tx.send(Err(()));
            }
        });

        self.handle = Some(handle);

        match ready_rx.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(Err(())) => Err(PipelineError::HotkeyPermissionDenied),
            _ => Ok(()),
        }
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        *self.down_is_send.lock().unwrap() = None;
        debug!("hotkey listener deactivated");
    }
}

fn handle_key_down(
    key: rdev::Key,
    primary: &Mutex<Option<KeyCode>>,
    send: &Mutex<Option<KeyCode>>,
    down_is_send: &Mutex<Option<bool>>,
    on_key_down: &Mutex<Option<KeyCallback>>,
) {
    let mut current = down_is_send.lock().unwrap();
    if current.is_some() {
        return; // autorepeat: already down, ignore
    }

    let is_send = if Some(key) == *send.lock().unwrap() {
        true
    } else if Some(key) == *primary.lock().unwrap() {
        false
    } else {
        return;
    };

    *current = Some(is_send);
    drop(current);

    if let Some(cb) = on_key_down.lock().unwrap().as_ref() {
        cb(is_send);
    }
}

fn handle_key_up(
    key: rdev::Key,
    primary: &Mutex<Option<KeyCode>>,
    send: &Mutex<Option<KeyCode>>,
    down_is_send: &Mutex<Option<bool>>,
    on_key_up: &Mutex<Option<KeyCallback>>,
) {
    let is_tracked_key = Some(key) == *primary.lock().unwrap() || Some(key) == *send.lock().unwrap();
    if !is_tracked_key {
        return;
    }

    let was_send = {
        let mut current = down_is_send.lock().unwrap();
        current.take()
    };

    let Some(was_send) = was_send else {
        return; // no matching key-down tracked
    };

    if let Some(cb) = on_key_up.lock().unwrap().as_ref() {
        cb(was_send);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn key_down_ignores_autorepeat() {
        let down_is_send = Mutex::new(None);
        let primary = Mutex::new(Some(rdev::Key::F13));
        let send = Mutex::new(Some(rdev::Key::F14));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let cb: Mutex<Option<KeyCallback>> = Mutex::new(Some(Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        })));

        handle_key_down(rdev::Key::F13, &primary, &send, &down_is_send, &cb);
        handle_key_down(rdev::Key::F13, &primary, &send, &down_is_send, &cb);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn key_up_reports_is_send_from_matching_key_down() {
        let down_is_send = Mutex::new(None);
        let primary = Mutex::new(Some(rdev::Key::F13));
        let send = Mutex::new(Some(rdev::Key::F14));

        let down_cb: Mutex<Option<KeyCallback>> = Mutex::new(Some(Box::new(|_| {})));
        handle_key_down(rdev::Key::F14, &primary, &send, &down_is_send, &down_cb);

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let up_cb: Mutex<Option<KeyCallback>> = Mutex::new(Some(Box::new(move |is_send| {
            *seen_clone.lock().unwrap() = Some(is_send);
        })));
        handle_key_up(rdev::Key::F14, &primary, &send, &down_is_send, &up_cb);

        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn untracked_key_is_ignored() {
        let down_is_send = Mutex::new(None);
        let primary = Mutex::new(Some(rdev::Key::F13));
        let send = Mutex::new(Some(rdev::Key::F14));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let cb: Mutex<Option<KeyCallback>> = Mutex::new(Some(Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        })));

        handle_key_down(rdev::Key::KeyA, &primary, &send, &down_is_send, &cb);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
