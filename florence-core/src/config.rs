//! Agent configuration
//!
//! Configuration is resolved once at startup from environment variables and
//! CLI flags, then treated as immutable for the life of the process. All
//! validation happens here, before any network call: an unknown model or a
//! missing credential must fail fast, not twenty seconds into an exchange.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{ModelProfile, Vendor};

/// Default model when neither flag nor environment chooses one
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature sent with every completion request
pub const TEMPERATURE: f32 = 0.5;

/// The assistant's name, used in the persona and the prompt display
pub const ASSISTANT_NAME: &str = "Florence";

/// Errors detected during configuration resolution
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested model has no registered profile
    #[error("unknown model {0:?} (known models: see --help)")]
    UnknownModel(String),

    /// A model profile left no token budget for history
    #[error("model profile leaves no token budget for history")]
    ZeroBudget,

    /// The API key for the selected provider is not set
    #[error("missing credential: set {0}")]
    MissingCredential(&'static str),
}

/// Resolved, immutable runtime configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Wire name of the model to use
    pub model: String,
    /// Read and write the persistent transcript
    pub use_history: bool,
    /// Prepend the persona system turn
    pub use_system: bool,
    /// Echo the assembled window before each request
    pub verbose: bool,
    /// Path of the JSONL history file
    pub history_path: PathBuf,
    /// System persona content
    pub persona: String,
}

impl AgentConfig {
    /// Build a configuration from the environment
    ///
    /// `FLORENCE_MODEL` selects the model, `FLORENCE_NO_HISTORY` and
    /// `FLORENCE_NO_SYSTEM` (set to `1`) disable the transcript and persona,
    /// and `VERBOSE=1` turns on the window echo. CLI flags may override the
    /// resulting fields afterwards.
    pub fn from_env() -> Self {
        let model =
            std::env::var("FLORENCE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            model,
            use_history: std::env::var("FLORENCE_NO_HISTORY").as_deref() != Ok("1"),
            use_system: std::env::var("FLORENCE_NO_SYSTEM").as_deref() != Ok("1"),
            verbose: std::env::var("VERBOSE").as_deref() == Ok("1"),
            history_path: default_history_path(),
            persona: default_persona(),
        }
    }

    /// Resolve the model name against the profile registry
    pub fn profile(&self) -> Result<ModelProfile, ConfigError> {
        ModelProfile::lookup(&self.model)
    }

    /// Fetch the API key the selected model's provider requires
    ///
    /// Checked before any request is built so a missing key surfaces as a
    /// clear configuration error rather than an HTTP 401.
    pub fn require_api_key(&self) -> Result<String, ConfigError> {
        let var = match self.profile()?.vendor {
            Vendor::OpenAi => "OPENAI_API_KEY",
            Vendor::Anthropic => "ANTHROPIC_API_KEY",
        };
        std::env::var(var).map_err(|_| ConfigError::MissingCredential(var))
    }
}

/// Default history file: `~/.florence_history.jsonl`
///
/// Falls back to the current directory when the home directory cannot be
/// determined.
pub fn default_history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".florence_history.jsonl")
}

/// The default persona, addressed to the login user
///
/// The trailing paragraph teaches the model the tool-call markers the
/// dispatcher understands.
pub fn default_persona() -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "friend".to_string());
    format!(
        "You are {name}, a clever and friendly AI. You are chatting with your \
         friend, {user}. You trust them completely, and will do your best to do \
         anything they ask. They are talking to you on a Unix terminal.\n\n\
         You have two tools. To search the web, reply with only \
         <g>your query</g>. To read a web page, reply with only \
         <fetch>the url</fetch>. The results will be sent back to you as the \
         next message.",
        name = ASSISTANT_NAME,
        user = user,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_has_a_profile() {
        let config = AgentConfig {
            model: DEFAULT_MODEL.to_string(),
            use_history: true,
            use_system: true,
            verbose: false,
            history_path: default_history_path(),
            persona: default_persona(),
        };
        assert!(config.profile().is_ok());
    }

    #[test]
    fn test_unknown_model_is_config_error() {
        let config = AgentConfig {
            model: "not-a-model".to_string(),
            use_history: true,
            use_system: true,
            verbose: false,
            history_path: default_history_path(),
            persona: String::new(),
        };
        assert!(matches!(config.profile(), Err(ConfigError::UnknownModel(_))));
    }

    #[test]
    fn test_persona_mentions_both_markers() {
        let persona = default_persona();
        assert!(persona.contains("<g>"));
        assert!(persona.contains("<fetch>"));
        assert!(persona.contains(ASSISTANT_NAME));
    }

    #[test]
    fn test_history_path_filename() {
        let path = default_history_path();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(".florence_history.jsonl")
        );
    }
}
