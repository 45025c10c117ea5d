use serde::{Deserialize, Serialize};

/// Dynamic sampling-strategy enumeration, carrying its own integer
/// parameter per variant. The Whisper adapter maps this onto
/// `whisper_rs::SamplingStrategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SamplingStrategy {
    Greedy { best_of: i32 },
    BeamSearch { beam_size: i32 },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_greedy_best_of_one() {
        assert_eq!(SamplingStrategy::default(), SamplingStrategy::Greedy { best_of: 1 });
    }
}
