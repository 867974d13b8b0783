//! Page fetcher
//!
//! Fetches a URL and reduces it to readable text: Readability pulls the
//! article body out of the page, then html2md strips the remaining markup
//! down to markdown-ish plain text. Pages Readability cannot make sense of
//! fall back to converting the whole document.

use std::time::Duration;

use async_trait::async_trait;
use html2md::parse_html;
use readability_rust::Readability;
use thiserror::Error;
use tracing::debug;
use url::Url;

use florence_core::{PageFetcher, ToolError};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; florence/0.3)";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors from fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL did not parse
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The response is not a page we can read
    #[error("unsupported content type {content_type:?} at {url}")]
    UnsupportedContent { url: String, content_type: String },

    /// The request never completed
    #[error("fetching {url} failed: {reason}")]
    Network { url: String, reason: String },
}

/// HTTP page fetcher
pub struct HttpFetcher {
    http: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch a URL and return its readable text
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|err| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;

        let network_err = |reason: String| FetchError::Network {
            url: url.to_string(),
            reason,
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.http
                .get(parsed)
                .header("User-Agent", USER_AGENT)
                .send(),
        )
        .await
        .map_err(|_| network_err(format!("timed out after {:?}", self.timeout)))?
        .map_err(|err| network_err(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        if !is_readable(&content_type) {
            return Err(FetchError::UnsupportedContent {
                url: url.to_string(),
                content_type,
            });
        }

        let html = response
            .text()
            .await
            .map_err(|err| network_err(err.to_string()))?;

        let text = reduce_to_text(&html);
        debug!(%url, bytes = text.len(), "fetched page");
        Ok(text)
    }
}

fn is_readable(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    essence.starts_with("text/") || essence == "application/xhtml+xml"
}

/// Readability extraction with a whole-document fallback
fn reduce_to_text(html: &str) -> String {
    let body = match Readability::new(html, None) {
        Ok(mut parser) => match parser.parse().and_then(|article| article.content) {
            Some(content) => content,
            None => html.to_string(),
        },
        Err(_) => html.to_string(),
    };
    parse_html(&body).trim().to_string()
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        self.fetch_text(url)
            .await
            .map_err(|err| ToolError(err.to_string()))
    }
}
