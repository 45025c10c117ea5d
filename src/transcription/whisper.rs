//! `whisper-rs` adapter implementing [`Transcriber`].

use std::path::Path;
use tracing::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy as WhisperSampling, WhisperContext, WhisperContextParameters};

use crate::error::{PipelineError, Result};

use super::sampling::SamplingStrategy;
use super::segment::{TranscriptionResult, TranscriptionSegment};
use super::traits::Transcriber;

/// Known Whisper model sizes and their expected file names / sizes, used
/// for model discovery and sanity-checking a downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperModel {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    pub fn filename(&self) -> &'static str {
        match self {
            Self::Tiny => "ggml-tiny.bin",
            Self::Base => "ggml-base.bin",
            Self::Small => "ggml-small.bin",
            Self::Medium => "ggml-medium.bin",
            Self::Large => "ggml-large.bin",
        }
    }

    /// Expected size range in MB (min, max), used to catch a truncated or
    /// mismatched download before we hand it to whisper.cpp.
    pub fn size_range_mb(&self) -> (u64, u64) {
        match self {
            Self::Tiny => (30, 100),
            Self::Base => (100, 200),
            Self::Small => (200, 500),
            Self::Medium => (500, 1600),
            Self::Large => (1500, 4000),
        }
    }
}

const WARMUP_SAMPLE_COUNT: usize = 16000; // 1s of synthetic silence at 16kHz

pub struct WhisperProvider {
    ctx: WhisperContext,
    language: String,
    n_threads: i32,
    sampling: SamplingStrategy,
    model_name: String,
}

impl WhisperProvider {
    pub fn new(
        model_path: &Path,
        language: &str,
        n_threads: i32,
        use_gpu: bool,
        sampling: SamplingStrategy,
    ) -> Result<Self> {
        Self::validate_model(model_path)?;

        info!("loading whisper model from {:?}", model_path);
        let mut params = WhisperContextParameters::default();
        params.use_gpu(use_gpu);

        let path_str = model_path.to_str().ok_or_else(|| PipelineError::ModelLoadFailed {
            path: model_path.to_path_buf(),
            reason: "model path is not valid UTF-8".to_string(),
        })?;

        let ctx = WhisperContext::new_with_params(path_str, params).map_err(|e| {
            PipelineError::ModelLoadFailed {
                path: model_path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let model_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        info!("whisper model loaded: {}", model_name);

        Ok(Self {
            ctx,
            language: language.to_string(),
            n_threads,
            sampling,
            model_name,
        })
    }

    fn validate_model(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::ModelLoadFailed {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        let metadata = std::fs::metadata(path)?;
        let size_mb = metadata.len() / (1024 * 1024);

        if !(30..=4000).contains(&size_mb) {
            return Err(PipelineError::ModelLoadFailed {
                path: path.to_path_buf(),
                reason: format!("unexpected model size: {size_mb}MB"),
            });
        }

        debug!("model file validated: {}MB", size_mb);
        Ok(())
    }

    fn sampling_params(&self) -> FullParams {
        match self.sampling {
            SamplingStrategy::Greedy { best_of } => {
                FullParams::new(WhisperSampling::Greedy { best_of })
            }
            SamplingStrategy::BeamSearch { beam_size } => {
                FullParams::new(WhisperSampling::BeamSearch {
                    beam_size,
                    patience: -1.0,
                })
            }
        }
    }

    fn run(&self, samples: &[f32], context_prompt: Option<&str>) -> Result<TranscriptionResult> {
        let start = std::time::Instant::now();

        let mut params = self.sampling_params();
        params.set_n_threads(self.n_threads);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_token_timestamps(true);

        if self.language != "auto" {
            params.set_language(Some(&self.language));
        }

        if let Some(prompt) = context_prompt.filter(|p| !p.is_empty()) {
            params.set_initial_prompt(prompt);
        }

        let mut state = self.ctx.create_state().map_err(|_| PipelineError::TranscribeFailed { code: -1 })?;

        if state.full(params, samples).is_err() {
            warn!("whisper inference failed");
            return Ok(TranscriptionResult::empty(
                self.model_name.clone(),
                samples_duration_ms(samples),
                start.elapsed().as_millis() as u64,
            ));
        }

        let num_segments = state
            .full_n_segments()
            .map_err(|_| PipelineError::TranscribeFailed { code: -2 })?;

        let mut segments = Vec::with_capacity(num_segments as usize);
        for i in 0..num_segments {
            let text = state.full_get_segment_text(i).unwrap_or_default();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let start_ms = state.full_get_segment_t0(i).unwrap_or(0).max(0) as u64 * 10;
            let end_ms = state.full_get_segment_t1(i).unwrap_or(0).max(0) as u64 * 10;
            let no_speech_prob = state.full_get_segment_no_speech_prob(i).ok();
            let avg_token_prob = average_token_probability(&state, i);

            segments.push(TranscriptionSegment {
                text: trimmed.to_string(),
                start_ms,
                end_ms,
                no_speech_prob,
                avg_token_prob,
            });
        }

        let wall_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            "transcribed {} samples in {}ms ({} segments)",
            samples.len(),
            wall_time_ms,
            segments.len()
        );

        Ok(TranscriptionResult {
            segments,
            audio_duration_ms: samples_duration_ms(samples),
            wall_time_ms,
            model_name: self.model_name.clone(),
        })
    }
}

fn samples_duration_ms(samples: &[f32]) -> u64 {
    (samples.len() as u64 * 1000) / 16000
}

fn average_token_probability(state: &whisper_rs::WhisperState, segment: i32) -> Option<f32> {
    let n_tokens = state.full_n_tokens(segment).ok()?;
    if n_tokens == 0 {
        return None;
    }
    let mut sum = 0.0f32;
    let mut count = 0u32;
    for t in 0..n_tokens {
        if let Ok(data) = state.full_get_token_data(segment, t) {
            sum += data.p;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}

impl Transcriber for WhisperProvider {
    fn warmup(&self) -> Result<()> {
        debug!("warming up whisper model with synthetic silence");
        let silence = vec![0.0f32; WARMUP_SAMPLE_COUNT];
        self.run(&silence, None)?;
        Ok(())
    }

    fn transcribe(&self, samples: &[f32], context_prompt: Option<&str>) -> Result<TranscriptionResult> {
        self.run(samples, context_prompt)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_filenames() {
        assert_eq!(WhisperModel::Small.filename(), "ggml-small.bin");
        assert_eq!(WhisperModel::Tiny.filename(), "ggml-tiny.bin");
    }

    #[test]
    fn duration_math_matches_16khz() {
        assert_eq!(samples_duration_ms(&vec![0.0; 16000]), 1000);
        assert_eq!(samples_duration_ms(&vec![0.0; 8000]), 500);
    }
}
