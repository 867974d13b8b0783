//! Completion providers
//!
//! A provider turns an assembled window into a reply string. The trait is
//! deliberately narrow: callers hand over the final turn list and get back
//! text or a categorized error. Budgeting, persistence, and tool dispatch
//! all happen above this layer.
//!
//! Provider failures are not retried here. The agent surfaces them to the
//! user and ends the turn; only the search tool carries its own retry,
//! because its failures become conversation content instead.

mod anthropic;
mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Turn;

/// Errors from a completion request
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials rejected (HTTP 401/403)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Throttled by the provider (HTTP 429)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Request never completed (DNS, connect, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Provider returned a non-success status
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    /// Provider returned 2xx but the body had an unexpected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Map a non-success HTTP status and body excerpt to an error variant
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Auth(message),
            429 => Self::RateLimited(message),
            _ => Self::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// One fully assembled completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model wire name
    pub model: String,
    /// The assembled window, system turn first when present
    pub messages: Vec<Turn>,
    /// Reply-length cap in tokens
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
}

/// A client for one remote completion API
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submit the request and return the reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
