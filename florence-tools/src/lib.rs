//! # Florence tools
//!
//! External-action collaborators for the florence assistant: the web search
//! client and page fetcher behind the tool-call markers, and local speech
//! synthesis. The trait seams ([`florence_core::SearchClient`],
//! [`florence_core::PageFetcher`]) live in the core crate; this crate holds
//! the HTTP implementations.

pub mod fetch;
pub mod search;
pub mod speech;

pub use fetch::{FetchError, HttpFetcher};
pub use search::{HttpSearchClient, RetryConfig, SearchError, SearchHit};
pub use speech::Speaker;
