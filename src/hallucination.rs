//! Filters transcribed text that Whisper hallucinates on silence, music,
//! or its own prompt, before it reaches the output injector.
//!
//! Rule 1 (segment confidence drop) lives on [`TranscriptionSegment`]
//! itself (`is_low_confidence`) since it needs the raw `no_speech_prob`/
//! `avg_token_prob` that this module's plain-text rules don't see.

use std::collections::HashMap;

use crate::transcription::TranscriptionSegment;

const MIN_NON_WHITESPACE_CHARS: usize = 3;
const TRIGRAM_REPEAT_THRESHOLD: usize = 3;
const PROMPT_ECHO_MIN_CHARS: usize = 10;

/// Well-known Whisper parrot phrases, matched case-insensitively against
/// the full trimmed text.
const PARROT_PHRASES: &[&str] = &[
    "thank you",
    "thank you.",
    "thanks for watching",
    "thanks for watching!",
    "please subscribe",
    "please subscribe!",
    "subscribe to my channel",
    "don't forget to subscribe",
    "like and subscribe",
    "see you next time",
    "see you in the next video",
    "see you next video",
    "bye bye",
    "goodbye",
    "thank you for watching",
    "thank you for watching!",
    "thanks for listening",
    "subtitles by the amara.org community",
    "subtitled by the amara.org community",
    "translated by the amara.org community",
    "subtitles by steamteamedia",
    "amara.org",
    "www.amara.org",
    "captioning by",
    "closed captioning by",
    "transcription by castingwords",
    "i don't know",
    "i'm sorry",
    "you",
    "okay",
    "ok",
    "yeah",
    "hmm",
    "mm-hmm",
    "uh",
    "um",
    "silence",
    "music",
    "music playing",
    "[music]",
    "[silence]",
    "[blank_audio]",
];

/// Full plain-text pipeline (rules 2-5). `last_context_text` enables rule 5
/// (prompt echo), which only applies in continuous mode; pass `None` in
/// buffered mode.
pub fn accept(text: &str, last_context_text: Option<&str>) -> bool {
    let trimmed = text.trim();

    if !passes_length(trimmed) {
        return false;
    }
    if is_literal_parrot(trimmed) {
        return false;
    }
    if has_repetitive_trigram(trimmed) {
        return false;
    }
    if let Some(context) = last_context_text {
        if is_prompt_echo(trimmed, context) {
            return false;
        }
    }
    true
}

fn passes_length(text: &str) -> bool {
    text.chars().filter(|c| !c.is_whitespace()).count() >= MIN_NON_WHITESPACE_CHARS
}

fn is_literal_parrot(text: &str) -> bool {
    let lowered = text.to_lowercase();
    PARROT_PHRASES.iter().any(|phrase| lowered == *phrase)
}

fn has_repetitive_trigram(text: &str) -> bool {
    let words: Vec<String> = text.split_whitespace().map(|w| w.to_lowercase()).collect();
    if words.len() < 3 {
        return false;
    }

    let mut counts: HashMap<(String, String, String), usize> = HashMap::new();
    for window in words.windows(3) {
        let key = (window[0].clone(), window[1].clone(), window[2].clone());
        let entry = counts.entry(key).or_insert(0);
        *entry += 1;
        if *entry >= TRIGRAM_REPEAT_THRESHOLD {
            return true;
        }
    }
    false
}

fn is_prompt_echo(text: &str, last_context_text: &str) -> bool {
    if text.chars().count() < PROMPT_ECHO_MIN_CHARS {
        return false;
    }
    last_context_text.to_lowercase().contains(&text.to_lowercase())
}

/// Joins only the segments that pass the confidence-drop rule, applies the
/// shared length/phrase/trigram rules, and returns `None` if nothing
/// survives. Used by buffered mode, where prompt echo does not apply.
pub fn filtered_buffered_text(segments: &[TranscriptionSegment]) -> Option<String> {
    let joined = segments
        .iter()
        .filter(|s| !s.is_low_confidence())
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if accept(&joined, None) {
        Some(joined)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_text() {
        assert!(!accept("hi", None));
        assert!(!accept("  ", None));
    }

    #[test]
    fn rejects_known_parrot_phrases_case_insensitively() {
        assert!(!accept("Thank you.", None));
        assert!(!accept("PLEASE SUBSCRIBE", None));
    }

    #[test]
    fn accepts_ordinary_text() {
        assert!(accept("the weather today is quite nice", None));
    }

    #[test]
    fn rejects_repetitive_trigram() {
        let text = "go go go go go go go go go";
        assert!(!accept(text, None));
    }

    #[test]
    fn allows_repeated_bigram_but_not_trigram() {
        let text = "okay okay let's go okay okay let's go again";
        // "okay okay let's" repeats twice here, not three times.
        assert!(accept(text, None));
    }

    #[test]
    fn rejects_prompt_echo_when_text_is_substring_of_context() {
        let context = "we discussed the quarterly roadmap and budget planning session";
        assert!(!accept("quarterly roadmap and budget", Some(context)));
    }

    #[test]
    fn prompt_echo_does_not_apply_in_buffered_mode() {
        let context = "we discussed the quarterly roadmap and budget planning session";
        assert!(accept("quarterly roadmap and budget", None));
        let _ = context;
    }

    #[test]
    fn filtered_buffered_text_drops_low_confidence_segments() {
        let mut ok = TranscriptionSegment::new(0, 1000, "turn left at the light".into());
        ok.no_speech_prob = Some(0.1);
        ok.avg_token_prob = Some(0.9);

        let mut noise = TranscriptionSegment::new(1000, 2000, "thank you".into());
        noise.no_speech_prob = Some(0.95);
        noise.avg_token_prob = Some(0.02);

        let result = filtered_buffered_text(&[ok, noise]);
        assert_eq!(result.as_deref(), Some("turn left at the light"));
    }

    #[test]
    fn filtered_buffered_text_is_none_when_everything_drops() {
        let mut noise = TranscriptionSegment::new(0, 1000, "thank you".into());
        noise.no_speech_prob = Some(0.95);
        noise.avg_token_prob = Some(0.02);
        assert!(filtered_buffered_text(&[noise]).is_none());
    }
}
