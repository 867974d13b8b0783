//! Anthropic messages client
//!
//! The Messages API differs from the chat-completions shape in one way that
//! matters here: a system turn is not a message. It travels in a top-level
//! `system` field, and the API rejects `"role": "system"` inside `messages`.
//! The client lifts the system turn out before serializing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionClient, CompletionRequest, ProviderError};
use crate::types::{Role, Turn};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Client for the `/v1/messages` endpoint
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Turn],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    /// Create a client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Override the base URL (tests point this at a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);

        // Split the window: leading system turn becomes the top-level field,
        // everything else stays in messages.
        let (system, messages) = match request.messages.split_first() {
            Some((first, rest)) if first.role == Role::System => {
                (Some(first.content.as_str()), rest)
            }
            _ => (None, request.messages.as_slice()),
        };

        let body = MessagesRequest {
            model: &request.model,
            system,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %request.model, turns = messages.len(), "anthropic request");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::MalformedResponse(err.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| ProviderError::MalformedResponse("no text block in reply".into()))?;

        Ok(text.trim().to_string())
    }
}
