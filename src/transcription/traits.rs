use crate::error::Result;

use super::segment::TranscriptionResult;

/// The ASR seam. Concrete engines (Whisper today) are loaded from a model
/// file by their own `new`, then driven entirely through this trait so the
/// Pipeline never depends on a specific engine.
pub trait Transcriber: Send + Sync {
    /// Forces kernel compilation / memory pinning with synthetic audio
    /// before the first real call, so the first user utterance isn't
    /// penalized with model warm-up latency.
    fn warmup(&self) -> Result<()>;

    /// `samples` must already be 16 kHz mono. `context_prompt` seeds the
    /// engine's initial prompt, when present.
    fn transcribe(&self, samples: &[f32], context_prompt: Option<&str>) -> Result<TranscriptionResult>;

    fn model_name(&self) -> &str;
}
