//! Model profiles
//!
//! A profile records the token geometry of a remote model: how big its
//! context window is and how much of it we reserve for the reply. The
//! history budget for the window assembler falls out of those two numbers
//! plus a fixed safety margin that absorbs estimator error.
//!
//! Profiles are provider-agnostic metadata. All API interaction goes through
//! the completion clients in [`crate::provider`].

use crate::config::ConfigError;

/// Tokens held back from every budget to absorb estimation error
pub const SAFETY_MARGIN: usize = 64;

/// Which wire protocol a model speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    OpenAi,
    Anthropic,
}

/// Token geometry for one remote model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    /// Model identifier as sent on the wire
    pub name: &'static str,
    /// Which provider protocol this model speaks
    pub vendor: Vendor,
    /// Total context window in tokens
    pub context_tokens: usize,
    /// Tokens reserved for the model's reply
    pub max_reply_tokens: usize,
}

/// Known models, looked up by exact wire name
const PROFILES: &[ModelProfile] = &[
    ModelProfile {
        name: "gpt-3.5-turbo",
        vendor: Vendor::OpenAi,
        context_tokens: 4096,
        max_reply_tokens: 256,
    },
    ModelProfile {
        name: "gpt-4",
        vendor: Vendor::OpenAi,
        context_tokens: 8192,
        max_reply_tokens: 1024,
    },
    ModelProfile {
        name: "gpt-4-turbo",
        vendor: Vendor::OpenAi,
        context_tokens: 128_000,
        max_reply_tokens: 4096,
    },
    ModelProfile {
        name: "claude-v1",
        vendor: Vendor::Anthropic,
        context_tokens: 9000,
        max_reply_tokens: 1024,
    },
    ModelProfile {
        name: "claude-3-5-haiku-latest",
        vendor: Vendor::Anthropic,
        context_tokens: 200_000,
        max_reply_tokens: 4096,
    },
];

impl ModelProfile {
    /// Look up a profile by its wire name
    ///
    /// An unknown name is a fatal configuration error. Guessing a context
    /// window would make the budget arithmetic silently wrong, so we refuse
    /// instead.
    pub fn lookup(name: &str) -> Result<Self, ConfigError> {
        PROFILES
            .iter()
            .find(|profile| profile.name == name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
    }

    /// Names of all known models
    pub fn known_models() -> impl Iterator<Item = &'static str> {
        PROFILES.iter().map(|profile| profile.name)
    }

    /// Tokens available for history after reserving the reply and margin
    pub fn history_budget(&self) -> usize {
        self.context_tokens
            .saturating_sub(self.max_reply_tokens)
            .saturating_sub(SAFETY_MARGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_model() {
        let profile = ModelProfile::lookup("gpt-3.5-turbo").unwrap();
        assert_eq!(profile.context_tokens, 4096);
        assert_eq!(profile.max_reply_tokens, 256);
        assert_eq!(profile.vendor, Vendor::OpenAi);
    }

    #[test]
    fn test_lookup_unknown_model_fails() {
        let err = ModelProfile::lookup("gpt-9000").unwrap_err();
        assert!(err.to_string().contains("gpt-9000"));
    }

    #[test]
    fn test_history_budget_arithmetic() {
        let profile = ModelProfile::lookup("gpt-3.5-turbo").unwrap();
        assert_eq!(profile.history_budget(), 4096 - 256 - SAFETY_MARGIN);
    }

    #[test]
    fn test_every_profile_has_a_positive_budget() {
        for name in ModelProfile::known_models() {
            let profile = ModelProfile::lookup(name).unwrap();
            assert!(
                profile.history_budget() > 0,
                "{} has no room for history",
                name
            );
        }
    }

    #[test]
    fn test_anthropic_models_are_flagged() {
        let profile = ModelProfile::lookup("claude-3-5-haiku-latest").unwrap();
        assert_eq!(profile.vendor, Vendor::Anthropic);
    }
}
