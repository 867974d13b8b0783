//! Web search client
//!
//! Scrapes an HTML results endpoint (DuckDuckGo's `html` frontend by
//! default) and extracts ordered title/URL pairs. Searches retry a few times
//! with exponential backoff before giving up: a transient search hiccup
//! should not cost the model its one dispatch for the turn.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use florence_core::{SearchClient, ToolError};

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; florence/0.3)";

/// Results kept per search
const MAX_RESULTS: usize = 8;

lazy_static! {
    static ref RESULT_LINK: Regex = Regex::new(
        r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#
    )
    .expect("result link pattern");
    static ref TAG: Regex = Regex::new(r"<[^>]+>").expect("tag pattern");
}

/// Errors from the search client
#[derive(Debug, Error)]
pub enum SearchError {
    /// All attempts failed
    #[error("search unavailable: {0}")]
    Unavailable(String),
}

/// Retry behavior for transient search failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: usize,
    /// Base delay for exponential backoff
    pub base_delay_ms: u64,
    /// Delay cap
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Backoff delay before the given 1-based attempt
    fn delay(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(10) as u32;
        let exp = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// One extracted search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// HTML-scraping search client
pub struct HttpSearchClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl Default for HttpSearchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSearchClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Override the results endpoint (tests point this at a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override retry behavior
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run a query, retrying transient failures
    pub async fn search_hits(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let mut last_error = String::new();
        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                let delay = self.retry.delay(attempt);
                warn!(attempt, ?delay, %last_error, "retrying search");
                tokio::time::sleep(delay).await;
            }
            match self.attempt(query).await {
                Ok(hits) => {
                    debug!(%query, hits = hits.len(), "search completed");
                    return Ok(hits);
                }
                Err(err) => last_error = err,
            }
        }
        Err(SearchError::Unavailable(last_error))
    }

    async fn attempt(&self, query: &str) -> Result<Vec<SearchHit>, String> {
        let url = format!("{}/html/", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|err| err.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let html = response.text().await.map_err(|err| err.to_string())?;
        Ok(extract_hits(&html))
    }
}

/// Pull ordered (title, url) pairs out of a results page
fn extract_hits(html: &str) -> Vec<SearchHit> {
    RESULT_LINK
        .captures_iter(html)
        .take(MAX_RESULTS)
        .map(|captures| SearchHit {
            url: captures[1].trim().to_string(),
            title: TAG.replace_all(&captures[2], "").trim().to_string(),
        })
        .filter(|hit| !hit.title.is_empty() && !hit.url.is_empty())
        .collect()
}

/// Render hits as the numbered listing handed back to the model
fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(index, hit)| format!("{}. {}\n   {}", index + 1, hit.title, hit.url))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, query: &str) -> Result<String, ToolError> {
        let hits = self
            .search_hits(query)
            .await
            .map_err(|err| ToolError(err.to_string()))?;
        Ok(format_hits(&hits))
    }
}
