//! # Florence core
//!
//! The conversation engine behind the `florence` terminal assistant: a
//! persistent chat transcript, a token-budgeted context window, pluggable
//! completion providers, and a small tool-call protocol for web search and
//! page fetching.
//!
//! ## Quick start
//!
//! ```ignore
//! use florence_core::{Agent, AgentConfig, OpenAiClient};
//! use florence_tools::{HttpFetcher, HttpSearchClient};
//!
//! #[tokio::main]
//! async fn main() -> florence_core::Result<()> {
//!     let config = AgentConfig::from_env();
//!     let api_key = config.require_api_key()?;
//!
//!     let mut agent = Agent::new(
//!         config,
//!         Box::new(OpenAiClient::new(api_key)),
//!         Box::new(HttpSearchClient::new()),
//!         Box::new(HttpFetcher::new()),
//!     )?;
//!
//!     for exchange in agent.run_turn("hello there").await? {
//!         println!("{}", exchange.reply.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## How a turn works
//!
//! Each user input runs through an explicit loop: assemble a window (pinned
//! system persona, budget-filtered history suffix, the pending input), submit
//! it, persist the exchange, then scan the reply for a tool-call marker.
//! A dispatched search or fetch becomes a synthesized follow-up turn and the
//! loop runs again, at most [`dispatch::MAX_TOOL_DEPTH`] times.

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod estimate;
pub mod model;
pub mod provider;
pub mod transcript;
pub mod types;
pub mod window;

pub use agent::{Agent, Exchange};
pub use config::{AgentConfig, ConfigError, ASSISTANT_NAME, DEFAULT_MODEL};
pub use dispatch::{
    scan, Dispatcher, PageFetcher, SearchClient, ToolCall, ToolError, MAX_TOOL_DEPTH,
};
pub use error::{Error, Result};
pub use estimate::{CharacterEstimator, LengthEstimator, TURN_OVERHEAD};
pub use model::{ModelProfile, Vendor};
pub use provider::{
    AnthropicClient, CompletionClient, CompletionRequest, OpenAiClient, ProviderError,
};
pub use transcript::{TranscriptError, TranscriptStore};
pub use types::{Role, Turn};
pub use window::{WindowAssembler, WindowUsage};
