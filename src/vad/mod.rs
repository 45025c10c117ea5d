pub mod config;
pub mod state_machine;

pub use config::VadConfig;
pub use state_machine::{VadState, VoiceActivityDetector};
