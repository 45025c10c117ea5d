pub mod sampling;
pub mod segment;
pub mod traits;
pub mod whisper;

pub use sampling::SamplingStrategy;
pub use segment::{TranscriptionResult, TranscriptionSegment};
pub use traits::Transcriber;
pub use whisper::{WhisperModel, WhisperProvider};
