//! Splits long 16 kHz buffers into overlapping chunks at low-energy
//! boundaries, and de-duplicates the overlap text between consecutive
//! chunks' transcriptions.

use tracing::debug;

use crate::error::Result;
use crate::transcription::{TranscriptionResult, TranscriptionSegment};

pub const MAX_CHUNK_SAMPLES: usize = 480_000; // 30s @ 16kHz
pub const OVERLAP_SAMPLES: usize = 24_000; // 1.5s @ 16kHz

const QUIET_SEARCH_SAMPLES: usize = 48_000; // 3s @ 16kHz
const QUIET_WINDOW_SAMPLES: usize = 1_600; // 100ms @ 16kHz
const CONTEXT_SUFFIX_CHARS: usize = 200;

/// Transcribes `samples` in chunks of at most [`MAX_CHUNK_SAMPLES`],
/// splitting at the quietest 100ms window near each chunk boundary and
/// de-duplicating the overlap region's text. `transcribe` is called once
/// per chunk with the chunk's samples and an optional context prompt
/// carried over from the previous chunk's tail.
pub fn transcribe_chunked(
    samples: &[f32],
    model_name: &str,
    transcribe: impl Fn(&[f32], Option<&str>) -> Result<TranscriptionResult>,
) -> Result<TranscriptionResult> {
    let len = samples.len();
    let mut offset = 0usize;
    let mut prev_suffix: Option<String> = None;
    let mut segments = Vec::new();
    let mut wall_time_ms = 0u64;

    while offset < len {
        let raw_end = (offset + MAX_CHUNK_SAMPLES).min(len);
        // Only hunt for a quiet split point when there's more audio after
        // this chunk to hand off to. Searching when `raw_end == len` finds
        // the same boundary on every call (the search range no longer
        // depends on `offset`), which would stall `offset` at a fixed
        // point and loop forever.
        let end = if raw_end < len {
            find_quiet_boundary(samples, offset, raw_end)
        } else {
            raw_end
        };

        let chunk_result = transcribe(&samples[offset..end], prev_suffix.as_deref())?;
        wall_time_ms += chunk_result.wall_time_ms;

        let offset_ms = (offset / 16) as u64;
        let mut chunk_segments = chunk_result.segments;
        for segment in chunk_segments.iter_mut() {
            segment.start_ms += offset_ms;
            segment.end_ms += offset_ms;
        }

        if let Some(prev) = &prev_suffix {
            dedup_overlap(prev, &mut chunk_segments);
        }

        let joined = chunk_segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        prev_suffix = Some(tail_chars(&joined, CONTEXT_SUFFIX_CHARS));

        segments.extend(chunk_segments);

        debug!("chunk [{}..{}) -> {} segments", offset, end, segments.len());

        if len - end < OVERLAP_SAMPLES {
            break;
        }
        offset = end - OVERLAP_SAMPLES;
    }

    Ok(TranscriptionResult {
        segments,
        audio_duration_ms: (len / 16) as u64,
        wall_time_ms,
        model_name: model_name.to_string(),
    })
}

/// Scans 100ms windows over the last 3s before `raw_end` (bounded by
/// `offset`) and returns the right edge of the quietest one. Falls back to
/// `raw_end` if no full window fits in range.
fn find_quiet_boundary(samples: &[f32], offset: usize, raw_end: usize) -> usize {
    let search_start = raw_end.saturating_sub(QUIET_SEARCH_SAMPLES).max(offset);
    if raw_end - search_start < QUIET_WINDOW_SAMPLES {
        return raw_end;
    }

    let mut best_end = raw_end;
    let mut best_rms = f32::MAX;
    let mut window_start = search_start;

    while window_start + QUIET_WINDOW_SAMPLES <= raw_end {
        let window = &samples[window_start..window_start + QUIET_WINDOW_SAMPLES];
        let rms = rms(window);
        if rms < best_rms {
            best_rms = rms;
            best_end = window_start + QUIET_WINDOW_SAMPLES;
        }
        window_start += QUIET_WINDOW_SAMPLES;
    }

    best_end
}

/// Drops a leading run of words from the first segment that duplicates the
/// trailing words of `prev_suffix`, trying the longest match (up to 10
/// words) down to a minimum of 3 words.
fn dedup_overlap(prev_suffix: &str, segments: &mut Vec<TranscriptionSegment>) {
    let Some(first) = segments.first_mut() else {
        return;
    };

    let prev_words: Vec<&str> = prev_suffix.split_whitespace().collect();
    let first_words: Vec<&str> = first.text.split_whitespace().collect();

    let max_len = 10.min(first_words.len()).min(prev_words.len());
    let mut matched_len = 0usize;

    for candidate_len in (3..=max_len).rev() {
        let prev_tail = &prev_words[prev_words.len() - candidate_len..];
        let first_head = &first_words[..candidate_len];
        if prev_tail
            .iter()
            .map(|w| w.to_lowercase())
            .eq(first_head.iter().map(|w| w.to_lowercase()))
        {
            matched_len = candidate_len;
            break;
        }
    }

    if matched_len == 0 {
        return;
    }

    let remaining: Vec<&str> = first_words[matched_len..].to_vec();
    if remaining.is_empty() {
        segments.remove(0);
    } else {
        first.text = remaining.join(" ");
    }
}

fn tail_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(char_count - max_chars).collect()
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loud(len: usize) -> Vec<f32> {
        vec![0.5; len]
    }

    #[test]
    fn single_chunk_when_within_max() {
        let samples = loud(1000);
        let calls = AtomicUsize::new(0);
        let result = transcribe_chunked(&samples, "tiny", |chunk, prompt| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.is_none());
            Ok(TranscriptionResult {
                segments: vec![TranscriptionSegment::new(0, (chunk.len() / 16) as u64, "hi".into())],
                audio_duration_ms: (chunk.len() / 16) as u64,
                wall_time_ms: 5,
                model_name: "tiny".into(),
            })
        })
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.segments.len(), 1);
    }

    #[test]
    fn exceeding_max_chunk_splits_into_two_calls() {
        let samples = loud(MAX_CHUNK_SAMPLES + 1);
        let calls = AtomicUsize::new(0);
        let result = transcribe_chunked(&samples, "tiny", |chunk, _prompt| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(TranscriptionResult {
                segments: vec![TranscriptionSegment::new(0, (chunk.len() / 16) as u64, "word".into())],
                audio_duration_ms: (chunk.len() / 16) as u64,
                wall_time_ms: 5,
                model_name: "tiny".into(),
            })
        })
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.audio_duration_ms, ((MAX_CHUNK_SAMPLES + 1) / 16) as u64);
    }

    /// Audio long enough to need several chunks must still terminate: the
    /// final chunk (where `raw_end` has clamped to `len`) must not re-run
    /// the quiet-boundary search, which would keep returning the same
    /// split point and loop forever.
    #[test]
    fn many_chunks_of_uniform_audio_terminates() {
        let samples = loud(MAX_CHUNK_SAMPLES * 3);
        let calls = AtomicUsize::new(0);
        let result = transcribe_chunked(&samples, "tiny", |chunk, _prompt| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            assert!(n < 20, "chunker did not terminate");
            Ok(TranscriptionResult {
                segments: vec![TranscriptionSegment::new(0, (chunk.len() / 16) as u64, "word".into())],
                audio_duration_ms: (chunk.len() / 16) as u64,
                wall_time_ms: 1,
                model_name: "tiny".into(),
            })
        })
        .unwrap();

        assert_eq!(result.audio_duration_ms, ((MAX_CHUNK_SAMPLES * 3) / 16) as u64);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn overlap_dedup_drops_matching_leading_words() {
        let mut segments = vec![TranscriptionSegment::new(0, 1000, "the quick brown fox jumps".into())];
        dedup_overlap("and then the quick brown", &mut segments);
        assert_eq!(segments[0].text, "fox jumps");
    }

    #[test]
    fn overlap_dedup_removes_segment_entirely_when_fully_duplicate() {
        let mut segments = vec![TranscriptionSegment::new(0, 1000, "the quick brown".into())];
        dedup_overlap("said the quick brown", &mut segments);
        assert!(segments.is_empty());
    }

    #[test]
    fn overlap_dedup_is_noop_when_no_match() {
        let mut segments = vec![TranscriptionSegment::new(0, 1000, "completely different text".into())];
        dedup_overlap("nothing in common here", &mut segments);
        assert_eq!(segments[0].text, "completely different text");
    }

    #[test]
    fn tail_chars_keeps_last_n_chars() {
        let text = "a".repeat(300);
        assert_eq!(tail_chars(&text, 200).len(), 200);
        assert_eq!(tail_chars("short", 200), "short");
    }

    #[test]
    fn quiet_boundary_prefers_the_quietest_window() {
        let mut samples = loud(QUIET_SEARCH_SAMPLES);
        // Carve a quiet window in the middle of the search range.
        let quiet_start = QUIET_SEARCH_SAMPLES / 2;
        for s in &mut samples[quiet_start..quiet_start + QUIET_WINDOW_SAMPLES] {
            *s = 0.0;
        }
        let end = find_quiet_boundary(&samples, 0, QUIET_SEARCH_SAMPLES);
        assert_eq!(end, quiet_start + QUIET_WINDOW_SAMPLES);
    }
}
