use serde::{Deserialize, Serialize};

/// One segment of a transcription call's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Probability the segment contains no speech at all (Whisper's
    /// `no_speech_prob`). `None` when the engine doesn't report it.
    pub no_speech_prob: Option<f32>,
    /// Mean per-token log-probability, mapped to `[0, 1]` by the adapter.
    pub avg_token_prob: Option<f32>,
}

impl TranscriptionSegment {
    pub fn new(start_ms: u64, end_ms: u64, text: String) -> Self {
        Self {
            text,
            start_ms,
            end_ms,
            no_speech_prob: None,
            avg_token_prob: None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Rule 1 of the hallucination filter: low confidence AND high
    /// no-speech probability together mark a segment as noise.
    pub fn is_low_confidence(&self) -> bool {
        match (self.no_speech_prob, self.avg_token_prob) {
            (Some(no_speech), Some(avg_token)) => no_speech > 0.60 && avg_token < 0.30,
            _ => false,
        }
    }
}

/// Result of one `Transcriber::transcribe` call (pre-chunking, pre-filter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub segments: Vec<TranscriptionSegment>,
    pub audio_duration_ms: u64,
    pub wall_time_ms: u64,
    pub model_name: String,
}

impl TranscriptionResult {
    pub fn empty(model_name: impl Into<String>, audio_duration_ms: u64, wall_time_ms: u64) -> Self {
        Self {
            segments: Vec::new(),
            audio_duration_ms,
            wall_time_ms,
            model_name: model_name.into(),
        }
    }

    /// Joins segments that pass the confidence-drop rule, space-separated.
    /// Used for the buffered-mode `filtered_text`.
    pub fn confidence_filtered_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| !s.is_low_confidence())
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn realtime_factor(&self) -> Option<f32> {
        if self.audio_duration_ms == 0 {
            return None;
        }
        Some(self.wall_time_ms as f32 / self.audio_duration_ms as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_requires_both_thresholds() {
        let mut seg = TranscriptionSegment::new(0, 1000, "uh".into());
        seg.no_speech_prob = Some(0.9);
        seg.avg_token_prob = Some(0.5);
        assert!(!seg.is_low_confidence(), "avg_token_prob above threshold should not drop");

        seg.avg_token_prob = Some(0.1);
        assert!(seg.is_low_confidence());
    }

    #[test]
    fn low_confidence_is_false_when_probabilities_unavailable() {
        let seg = TranscriptionSegment::new(0, 1000, "hello".into());
        assert!(!seg.is_low_confidence());
    }

    #[test]
    fn confidence_filtered_text_drops_low_confidence_segments_only() {
        let mut result = TranscriptionResult::empty("tiny", 2000, 100);
        let mut good = TranscriptionSegment::new(0, 1000, "hello there".into());
        good.no_speech_prob = Some(0.1);
        good.avg_token_prob = Some(0.9);

        let mut bad = TranscriptionSegment::new(1000, 2000, "thank you".into());
        bad.no_speech_prob = Some(0.95);
        bad.avg_token_prob = Some(0.05);

        result.segments.push(good);
        result.segments.push(bad);

        assert_eq!(result.confidence_filtered_text(), "hello there");
    }

    #[test]
    fn realtime_factor_is_none_for_zero_duration() {
        let result = TranscriptionResult::empty("tiny", 0, 50);
        assert!(result.realtime_factor().is_none());
    }
}
