//! Top-level error type
//!
//! Flattens the component errors into the three categories callers actually
//! handle differently:
//!
//! - [`Error::Config`]: fatal, detected before any network call; fix the
//!   configuration and rerun.
//! - [`Error::Provider`]: the completion request failed; the turn ends
//!   gracefully with the diagnostic shown to the user.
//! - [`Error::Transcript`]: persistence failed; the answer is still usable
//!   but the exchange was not durably recorded.
//!
//! Search and fetch failures never appear here: they are turned into
//! conversation content by the dispatcher.

use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::ProviderError;
use crate::transcript::TranscriptError;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration problem, fatal before any request is made
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The completion provider rejected or never completed the request
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The history file could not be read or written
    #[error("history error: {0}")]
    Transcript(#[from] TranscriptError),
}

impl Error {
    /// True when the user's answer was still produced despite the error
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Transcript(_))
    }
}

/// Result type for florence operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_impls() {
        let err: Error = ConfigError::UnknownModel("nope".into()).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_degraded());

        let err: Error = ProviderError::Auth("expired".into()).into();
        assert!(matches!(err, Error::Provider(_)));

        let err: Error = TranscriptError::Io {
            path: "/tmp/h".into(),
            source: std::io::Error::other("disk full"),
        }
        .into();
        assert!(err.is_degraded());
    }

    #[test]
    fn test_messages_carry_the_source() {
        let err: Error = ProviderError::RateLimited("try later".into()).into();
        assert!(err.to_string().contains("try later"));
    }
}
