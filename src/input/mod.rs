pub mod hook;
pub mod rdev_hook;

pub use hook::{parse_key_name, InputHook, KeyCallback, KeyCode};
pub use rdev_hook::RdevHook;
