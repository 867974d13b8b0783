//! Tool-call detection and dispatch
//!
//! Replies may embed lightweight tool-call markers instead of (or alongside)
//! prose. The scanner checks a fixed-priority marker table and returns the
//! first match; the dispatcher executes the action and synthesizes the
//! follow-up user turn that feeds the result back into the conversation.
//!
//! The marker table, in priority order:
//!
//! 1. `<g>query</g>` runs a web search
//! 2. `<fetch>url</fetch>` fetches a page
//!
//! Exactly one call is dispatched per reply. A failed action does not end
//! the turn; it becomes an inline error notice the model can react to, and
//! dispatch does not re-enter on it.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::estimate::LengthEstimator;
use crate::types::Turn;

/// Maximum tool dispatches per user input
///
/// Caps the assemble/complete/dispatch loop so a model that keeps emitting
/// markers cannot spin forever.
pub const MAX_TOOL_DEPTH: usize = 2;

lazy_static! {
    static ref SEARCH_MARKER: Regex =
        Regex::new(r"(?s)<g>(.*?)</g>").expect("search marker pattern");
    static ref FETCH_MARKER: Regex =
        Regex::new(r"(?s)<fetch>(.*?)</fetch>").expect("fetch marker pattern");
}

/// A tool call extracted from a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    /// Web search with the given query
    Search(String),
    /// Fetch the page at the given URL
    Fetch(String),
}

/// Scan a reply for a tool-call marker
///
/// Markers are checked in priority order and the first match wins; any
/// further markers in the same reply are ignored. The captured payload is
/// trimmed. A marker with an empty payload is not a call.
pub fn scan(reply: &str) -> Option<ToolCall> {
    if let Some(captures) = SEARCH_MARKER.captures(reply) {
        let query = captures[1].trim();
        if !query.is_empty() {
            return Some(ToolCall::Search(query.to_string()));
        }
    }
    if let Some(captures) = FETCH_MARKER.captures(reply) {
        let url = captures[1].trim();
        if !url.is_empty() {
            return Some(ToolCall::Fetch(url.to_string()));
        }
    }
    None
}

/// Why a tool action failed, as text for the conversation
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ToolError(pub String);

/// Executes web searches on behalf of the dispatcher
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a query and return a plain-text result listing
    async fn search(&self, query: &str) -> Result<String, ToolError>;
}

/// Fetches and extracts web pages on behalf of the dispatcher
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL and return its readable text
    async fn fetch(&self, url: &str) -> Result<String, ToolError>;
}

/// Result of dispatching one tool call
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The synthesized follow-up user turn
    pub turn: Turn,
    /// Whether the loop may re-enter on this outcome
    pub recurse: bool,
}

/// Executes tool calls and synthesizes their follow-up turns
pub struct Dispatcher {
    search: Box<dyn SearchClient>,
    fetcher: Box<dyn PageFetcher>,
    estimator: Box<dyn LengthEstimator>,
    /// Token cap for a synthesized result, typically half the history budget
    result_budget: usize,
}

impl Dispatcher {
    pub fn new(
        search: Box<dyn SearchClient>,
        fetcher: Box<dyn PageFetcher>,
        estimator: Box<dyn LengthEstimator>,
        result_budget: usize,
    ) -> Self {
        Self {
            search,
            fetcher,
            estimator,
            result_budget,
        }
    }

    /// Execute a call and build the follow-up user turn
    ///
    /// Success produces a summary-request turn carrying the (truncated)
    /// result and permits one more loop iteration. Failure produces an
    /// error-notice turn and stops recursion: retrying through the model
    /// on a dead tool only burns tokens.
    pub async fn dispatch(&self, call: &ToolCall) -> DispatchOutcome {
        match call {
            ToolCall::Search(query) => match self.search.search(query).await {
                Ok(results) => {
                    debug!(%query, "search dispatched");
                    let body = self.truncate(&results);
                    DispatchOutcome {
                        turn: Turn::user(format!(
                            "Here are the search results for \"{query}\". Please answer \
                             using them, citing what you used:\n\n{body}"
                        )),
                        recurse: true,
                    }
                }
                Err(err) => self.failure_turn(format!("The web search failed: {err}.")),
            },
            ToolCall::Fetch(url) => match self.fetcher.fetch(url).await {
                Ok(page) => {
                    debug!(%url, "fetch dispatched");
                    let body = self.truncate(&page);
                    DispatchOutcome {
                        turn: Turn::user(format!(
                            "Here is the content of {url}. Please summarize the parts \
                             relevant to our conversation:\n\n{body}"
                        )),
                        recurse: true,
                    }
                }
                Err(err) => self.failure_turn(format!("Fetching the page failed: {err}.")),
            },
        }
    }

    fn failure_turn(&self, notice: String) -> DispatchOutcome {
        warn!(%notice, "tool action failed");
        DispatchOutcome {
            turn: Turn::user(format!(
                "{notice} Please continue without that result."
            )),
            recurse: false,
        }
    }

    /// Truncate a raw result line-by-line against the result budget
    ///
    /// Head lines are preserved and later lines dropped once the running
    /// estimate crosses the budget. The first line is always kept, even when
    /// it alone exceeds the budget, so a synthesized turn is never empty.
    fn truncate(&self, raw: &str) -> String {
        let mut kept = Vec::new();
        let mut cost = 0usize;
        for (index, line) in raw.lines().enumerate() {
            cost += self.estimator.estimate(line);
            if index > 0 && cost > self.result_budget {
                kept.push("[...truncated...]");
                break;
            }
            kept.push(line);
        }
        kept.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::CharacterEstimator;

    struct ScriptedSearch(Result<String, String>);

    #[async_trait]
    impl SearchClient for ScriptedSearch {
        async fn search(&self, _query: &str) -> Result<String, ToolError> {
            self.0.clone().map_err(ToolError)
        }
    }

    struct ScriptedFetcher(Result<String, String>);

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, ToolError> {
            self.0.clone().map_err(ToolError)
        }
    }

    fn dispatcher(
        search: Result<&str, &str>,
        fetch: Result<&str, &str>,
        result_budget: usize,
    ) -> Dispatcher {
        Dispatcher::new(
            Box::new(ScriptedSearch(
                search.map(String::from).map_err(String::from),
            )),
            Box::new(ScriptedFetcher(fetch.map(String::from).map_err(String::from))),
            Box::new(CharacterEstimator::with_chars_per_token(1)),
            result_budget,
        )
    }

    #[test]
    fn test_scan_extracts_search_query() {
        let call = scan("Let me look that up. <g>weather today</g>").unwrap();
        assert_eq!(call, ToolCall::Search("weather today".to_string()));
    }

    #[test]
    fn test_scan_extracts_fetch_url() {
        let call = scan("<fetch> https://example.com/page </fetch>").unwrap();
        assert_eq!(call, ToolCall::Fetch("https://example.com/page".to_string()));
    }

    #[test]
    fn test_search_beats_fetch_when_both_present() {
        let reply = "<fetch>https://example.com</fetch> and <g>rust lang</g>";
        let call = scan(reply).unwrap();
        assert_eq!(call, ToolCall::Search("rust lang".to_string()));
    }

    #[test]
    fn test_plain_reply_has_no_call() {
        assert!(scan("The capital of France is Paris.").is_none());
    }

    #[test]
    fn test_empty_marker_is_not_a_call() {
        assert!(scan("<g>  </g>").is_none());
        assert!(scan("<fetch></fetch>").is_none());
    }

    #[test]
    fn test_first_search_marker_wins() {
        let call = scan("<g>one</g> <g>two</g>").unwrap();
        assert_eq!(call, ToolCall::Search("one".to_string()));
    }

    #[tokio::test]
    async fn test_successful_search_synthesizes_one_turn() {
        let dispatcher = dispatcher(Ok("1. Rust - rust-lang.org"), Ok(""), 1000);
        let outcome = dispatcher
            .dispatch(&ToolCall::Search("rust".to_string()))
            .await;
        assert!(outcome.recurse);
        assert!(outcome.turn.content.contains("search results for \"rust\""));
        assert!(outcome.turn.content.contains("rust-lang.org"));
    }

    #[tokio::test]
    async fn test_failed_search_synthesizes_error_notice() {
        let dispatcher = dispatcher(Err("service unavailable"), Ok(""), 1000);
        let outcome = dispatcher
            .dispatch(&ToolCall::Search("rust".to_string()))
            .await;
        assert!(!outcome.recurse);
        assert!(outcome.turn.content.contains("search failed"));
        assert!(outcome.turn.content.contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_failed_fetch_synthesizes_error_notice() {
        let dispatcher = dispatcher(Ok(""), Err("404"), 1000);
        let outcome = dispatcher
            .dispatch(&ToolCall::Fetch("https://example.com".to_string()))
            .await;
        assert!(!outcome.recurse);
        assert!(outcome.turn.content.contains("failed"));
    }

    #[tokio::test]
    async fn test_long_result_is_truncated_head_first() {
        let raw = (0..100)
            .map(|i| format!("line {i} with some padding text"))
            .collect::<Vec<_>>()
            .join("\n");
        let dispatcher = dispatcher(Ok(raw.as_str()), Ok(""), 100);

        let outcome = dispatcher
            .dispatch(&ToolCall::Search("q".to_string()))
            .await;
        assert!(outcome.turn.content.contains("line 0"));
        assert!(!outcome.turn.content.contains("line 99"));
        assert!(outcome.turn.content.contains("[...truncated...]"));
    }

    #[tokio::test]
    async fn test_oversized_first_line_is_still_kept() {
        let raw = "x".repeat(500);
        let dispatcher = dispatcher(Ok(raw.as_str()), Ok(""), 10);

        let outcome = dispatcher
            .dispatch(&ToolCall::Search("q".to_string()))
            .await;
        assert!(outcome.turn.content.contains(&raw));
    }
}
