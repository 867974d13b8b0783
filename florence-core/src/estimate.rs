//! Token cost estimation
//!
//! The window assembler only needs a rough, monotone cost function, so the
//! estimator is pluggable: the default [`CharacterEstimator`] uses the common
//! ~4 bytes per token heuristic, and anything backed by a real tokenizer can
//! implement [`LengthEstimator`] instead.

/// Per-turn framing overhead in tokens
///
/// Every message in a chat request costs a few tokens for its role marker and
/// structure regardless of content length. Accounted once per turn by the
/// assembler, not by estimators.
pub const TURN_OVERHEAD: usize = 4;

/// Trait for estimating the token cost of a piece of text
pub trait LengthEstimator: Send + Sync {
    /// Estimated token count for `text`
    fn estimate(&self, text: &str) -> usize;
}

/// Character-based token estimator
///
/// Uses ~4 characters per token, rounding up. Accurate enough for budget
/// decisions as long as the budget carries a safety margin.
#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: usize,
}

impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterEstimator {
    /// Create an estimator with the default 4 characters per token
    pub fn new() -> Self {
        Self { chars_per_token: 4 }
    }

    /// Create an estimator with a custom characters-per-token ratio
    pub fn with_chars_per_token(chars_per_token: usize) -> Self {
        Self { chars_per_token }
    }
}

impl LengthEstimator for CharacterEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.len().div_ceil(self.chars_per_token)
    }
}
