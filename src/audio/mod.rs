pub mod capture;
pub mod resampler;

pub use capture::{list_input_devices, AudioCapture, AudioDevice};
pub use resampler::{resample_to_16k, TARGET_SAMPLE_RATE};
