//! Streaming RMS-gated voice activity detector.
//!
//! Operates on fixed 30 ms frames at the *active* sample rate (the rate
//! samples arrive at, not 16 kHz; resampling happens downstream at drain
//! time). Speech regions are padded symmetrically with pre/post audio so
//! Whisper doesn't clip onset/offset consonants.

use std::collections::VecDeque;
use tracing::{debug, trace};

use super::config::VadConfig;

const FRAME_MS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    SpeechOnset,
    Speaking,
    SpeechOffset,
}

pub struct VoiceActivityDetector {
    config: VadConfig,
    sample_rate: u32,
    frame_len: usize,

    state: VadState,
    is_speaking: bool,

    pre_pad: VecDeque<f32>,
    onset_buffer: Vec<f32>,
    onset_samples: usize,
    post_buffer: Vec<f32>,
    silence_samples: usize,
}

impl VoiceActivityDetector {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_config(sample_rate, VadConfig::default())
    }

    pub fn with_config(sample_rate: u32, config: VadConfig) -> Self {
        let frame_len = (FRAME_MS as u64 * sample_rate as u64 / 1000).max(1) as usize;
        Self {
            pre_pad: VecDeque::with_capacity(config.pre_pad_samples(sample_rate)),
            config,
            sample_rate,
            frame_len,
            state: VadState::Silence,
            is_speaking: false,
            onset_buffer: Vec::new(),
            onset_samples: 0,
            post_buffer: Vec::new(),
            silence_samples: 0,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.is_speaking
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    /// Replace the configuration. Idempotent: applying the same config
    /// twice in a row leaves state unchanged (it does not reset buffers).
    pub fn apply_config(&mut self, config: VadConfig) {
        if config == self.config {
            return;
        }
        let pre_pad_cap = config.pre_pad_samples(self.sample_rate);
        while self.pre_pad.len() > pre_pad_cap {
            self.pre_pad.pop_front();
        }
        self.config = config;
    }

    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.is_speaking = false;
        self.pre_pad.clear();
        self.onset_buffer.clear();
        self.onset_samples = 0;
        self.post_buffer.clear();
        self.silence_samples = 0;
    }

    /// Gate `input` through the state machine, returning the samples (if
    /// any) that should be appended to the ring buffer. When disabled,
    /// returns the input unchanged.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if !self.config.enabled {
            return input.to_vec();
        }

        let mut output = Vec::new();
        for frame in input.chunks(self.frame_len) {
            self.process_frame(frame, &mut output);
        }
        output
    }

    fn process_frame(&mut self, frame: &[f32], output: &mut Vec<f32>) {
        let rms = rms(frame);
        trace!(?self.state, rms, len = frame.len(), "vad frame");

        match self.state {
            VadState::Silence => {
                if rms >= self.config.speech_threshold {
                    self.onset_buffer.clear();
                    self.onset_buffer.extend_from_slice(frame);
                    self.onset_samples = frame.len();
                    self.state = VadState::SpeechOnset;
                } else {
                    self.push_pre_pad(frame);
                }
            }

            VadState::SpeechOnset => {
                if rms >= self.config.speech_threshold {
                    self.onset_buffer.extend_from_slice(frame);
                    self.onset_samples += frame.len();

                    if self.onset_samples >= self.config.min_speech_samples(self.sample_rate) {
                        output.extend(self.pre_pad.iter().copied());
                        self.pre_pad.clear();
                        output.extend(self.onset_buffer.drain(..));
                        self.onset_samples = 0;
                        self.is_speaking = true;
                        self.state = VadState::Speaking;
                        debug!("vad: speech onset confirmed");
                    }
                } else {
                    // Demote: the onset attempt was too short. Spill it back
                    // into silence history so it still counts as pre-pad for
                    // a subsequent onset.
                    for sample in self.onset_buffer.drain(..) {
                        self.pre_pad.push_back(sample);
                    }
                    self.onset_samples = 0;
                    self.push_pre_pad(frame);
                    self.state = VadState::Silence;
                }
            }

            VadState::Speaking => {
                if rms < self.config.silence_threshold {
                    self.post_buffer.clear();
                    self.post_buffer.extend_from_slice(frame);
                    self.silence_samples = frame.len();
                    self.state = VadState::SpeechOffset;
                } else {
                    output.extend_from_slice(frame);
                }
            }

            VadState::SpeechOffset => {
                if rms < self.config.silence_threshold {
                    self.post_buffer.extend_from_slice(frame);
                    self.silence_samples += frame.len();

                    if self.silence_samples >= self.config.min_silence_samples(self.sample_rate) {
                        let post_pad = self.config.post_pad_samples(self.sample_rate);
                        let take = post_pad.min(self.post_buffer.len());
                        output.extend_from_slice(&self.post_buffer[..take]);

                        self.post_buffer.clear();
                        self.silence_samples = 0;
                        self.is_speaking = false;
                        self.state = VadState::Silence;
                        debug!("vad: speech offset committed");
                    }
                } else {
                    output.extend(self.post_buffer.drain(..));
                    output.extend_from_slice(frame);
                    self.silence_samples = 0;
                    self.state = VadState::Speaking;
                }
            }
        }

        // Pre-pad history only accumulates while genuinely silent.
        if self.state == VadState::Silence {
            self.trim_pre_pad();
        }
    }

    fn push_pre_pad(&mut self, frame: &[f32]) {
        self.pre_pad.extend(frame.iter().copied());
        self.trim_pre_pad();
    }

    fn trim_pre_pad(&mut self) {
        let cap = self.config.pre_pad_samples(self.sample_rate);
        while self.pre_pad.len() > cap {
            self.pre_pad.pop_front();
        }
    }
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = frame.iter().map(|s| s * s).sum();
    (sum_sq / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    fn speech(len: usize) -> Vec<f32> {
        vec![0.2; len]
    }

    #[test]
    fn disabled_vad_passes_input_unchanged() {
        let mut cfg = VadConfig::default();
        cfg.enabled = false;
        let mut vad = VoiceActivityDetector::with_config(16000, cfg);
        let input: Vec<f32> = (0..1000).map(|i| (i as f32) * 0.001).collect();
        assert_eq!(vad.process(&input), input);
    }

    #[test]
    fn pure_silence_emits_nothing() {
        let mut vad = VoiceActivityDetector::new(16000);
        let out = vad.process(&silence(16000));
        assert!(out.is_empty());
        assert!(!vad.is_speaking());
    }

    #[test]
    fn sustained_speech_transitions_to_speaking_and_stays_until_silence_commits() {
        let mut vad = VoiceActivityDetector::new(16000);
        // Enough 30ms frames of "speech" to clear min_speech_ms (40ms default).
        let out = vad.process(&speech(4800)); // 300ms
        assert!(!out.is_empty());
        assert!(vad.is_speaking());

        // A single short dip shouldn't flip is_speaking off immediately;
        // SpeechOffset state holds until min_silence_ms is reached.
        let _ = vad.process(&silence(240)); // one 30ms-ish frame of quiet
        assert!(vad.is_speaking(), "is_speaking must remain stable during SpeechOffset");
    }

    #[test]
    fn reset_clears_all_state() {
        let mut vad = VoiceActivityDetector::new(16000);
        let _ = vad.process(&speech(4800));
        assert!(vad.is_speaking());
        vad.reset();
        assert!(!vad.is_speaking());
        assert_eq!(vad.state(), VadState::Silence);
    }

    #[test]
    fn short_onset_demotes_back_to_silence_without_emitting() {
        let mut vad = VoiceActivityDetector::new(16000);
        // One 30ms frame of speech-level RMS, below min_speech_ms (40ms);
        // should demote on the next silent frame rather than confirm onset.
        let out = vad.process(&speech(480));
        assert!(out.is_empty());
        let out2 = vad.process(&silence(480));
        assert!(out2.is_empty());
        assert!(!vad.is_speaking());
    }

    #[test]
    fn output_never_exceeds_input_plus_pre_pad_budget() {
        let mut vad = VoiceActivityDetector::new(16000);
        let pre_pad_budget = vad.config.pre_pad_samples(16000);
        let input = speech(16000);
        let out = vad.process(&input);
        assert!(out.len() <= input.len() + pre_pad_budget);
    }
}
