//! Conservative token estimation.
//!
//! Model limits are approximate and local tokenizers undercount relative to
//! the server, so every estimator here doubles its raw count. Over-counting
//! only costs a little extra summarization; under-counting makes the final
//! request fail.

use tracing::warn;

use crate::config::ModelProfile;

/// Multiplier applied to every raw token count.
pub const CONSERVATIVE_MULTIPLIER: usize = 2;

/// Default characters per token for the heuristic estimator.
/// Most tokenizers average 3-4 chars per token; 3.5 is a middle ground.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Estimates how many context tokens a text will consume.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Byte-pair tokenizer count for a specific model, doubled.
pub struct BpeEstimator {
    bpe: tiktoken_rs::CoreBPE,
}

impl BpeEstimator {
    /// Load the tokenizer matching `model`. Returns `None` for model names
    /// `tiktoken-rs` does not recognize.
    pub fn for_model(model: &str) -> Option<Self> {
        tiktoken_rs::get_bpe_from_model(model)
            .ok()
            .map(|bpe| Self { bpe })
    }

    /// Raw sub-word count, before the safety multiplier.
    pub fn raw_count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

impl TokenEstimator for BpeEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.raw_count(text) * CONSERVATIVE_MULTIPLIER
    }
}

/// Character-count heuristic, doubled. Used when no tokenizer is available.
#[derive(Debug, Clone)]
pub struct CharEstimator {
    chars_per_token: f64,
}

impl CharEstimator {
    /// Use a calibrated chars-per-token ratio. Non-positive ratios fall back
    /// to [`DEFAULT_CHARS_PER_TOKEN`].
    pub fn new(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token > 0.0 {
            chars_per_token
        } else {
            DEFAULT_CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }
}

impl Default for CharEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharEstimator {
    fn estimate(&self, text: &str) -> usize {
        let raw = (text.len() as f64 / self.chars_per_token).ceil() as usize;
        raw * CONSERVATIVE_MULTIPLIER
    }
}

/// Pick the estimator for the active profile: the model's tokenizer when one
/// exists, the character heuristic otherwise.
pub fn estimator_for(profile: &ModelProfile) -> Box<dyn TokenEstimator> {
    match BpeEstimator::for_model(profile.name) {
        Some(bpe) => Box::new(bpe),
        None => {
            warn!(
                "No tokenizer for {}; estimating at {DEFAULT_CHARS_PER_TOKEN} chars/token",
                profile.name
            );
            Box::new(CharEstimator::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpe_estimate_doubles_raw_count() {
        let bpe = BpeEstimator::for_model("gpt-3.5-turbo").unwrap();
        let text = "The Berlin Wall fell on 9 November 1989.";
        let raw = bpe.raw_count(text);
        assert!(raw > 0);
        assert_eq!(bpe.estimate(text), raw * 2);
    }

    #[test]
    fn both_required_models_have_tokenizers() {
        assert!(BpeEstimator::for_model(ModelProfile::GPT_4.name).is_some());
        assert!(BpeEstimator::for_model(ModelProfile::GPT_35_TURBO.name).is_some());
    }

    #[test]
    fn unknown_model_has_no_tokenizer() {
        assert!(BpeEstimator::for_model("definitely-not-a-model").is_none());
    }

    #[test]
    fn char_estimate_rounds_up_then_doubles() {
        let est = CharEstimator::new(4.0);
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("abcd"), 2);
        assert_eq!(est.estimate("abcde"), 4);
    }

    #[test]
    fn invalid_ratio_uses_default() {
        let est = CharEstimator::new(0.0);
        assert_eq!(est.estimate(&"x".repeat(35)), 20);
    }

    #[test]
    fn empty_text_is_free() {
        let est = estimator_for(&ModelProfile::GPT_4);
        assert_eq!(est.estimate(""), 0);
    }
}
