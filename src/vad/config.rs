use serde::{Deserialize, Serialize};

/// Tuning knobs for the voice activity detector. Copied into the VAD
/// whenever settings change; applying the same config twice is a no-op
/// (see `VoiceActivityDetector::apply_config`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// RMS level above which a frame is considered speech.
    pub speech_threshold: f32,
    /// RMS level below which a frame is considered silence. Must be
    /// `<= speech_threshold`; the gap between the two is the hysteresis
    /// band that keeps borderline frames from flapping.
    pub silence_threshold: f32,
    pub min_speech_ms: u32,
    pub min_silence_ms: u32,
    pub pre_pad_ms: u32,
    pub post_pad_ms: u32,
    pub enabled: bool,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: 0.02,
            silence_threshold: 0.015,
            min_speech_ms: 40,
            min_silence_ms: 600,
            pre_pad_ms: 200,
            post_pad_ms: 250,
            enabled: true,
        }
    }
}

impl VadConfig {
    /// Sample count equivalent of `pre_pad_ms` at the given sample rate.
    pub fn pre_pad_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.pre_pad_ms, sample_rate)
    }

    pub fn post_pad_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.post_pad_ms, sample_rate)
    }

    pub fn min_speech_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.min_speech_ms, sample_rate)
    }

    pub fn min_silence_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.min_silence_ms, sample_rate)
    }
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_to_samples_is_exact_at_common_rates() {
        let cfg = VadConfig::default();
        assert_eq!(cfg.pre_pad_samples(16000), 3200);
        assert_eq!(cfg.pre_pad_samples(48000), 9600);
    }
}
