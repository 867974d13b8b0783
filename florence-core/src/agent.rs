//! Conversation engine
//!
//! The agent owns the pieces and drives one user input to completion:
//! assemble a window, submit it, record the exchange, then check the reply
//! for a tool-call marker. Dispatched calls feed a synthesized user turn
//! back through the same loop, bounded by [`MAX_TOOL_DEPTH`]. The loop is
//! explicit; there is no recursion and no concurrency within a turn.

use tracing::{info, warn};

use crate::config::{AgentConfig, TEMPERATURE};
use crate::dispatch::{scan, Dispatcher, PageFetcher, SearchClient, MAX_TOOL_DEPTH};
use crate::error::Result;
use crate::estimate::CharacterEstimator;
use crate::model::ModelProfile;
use crate::provider::{CompletionClient, CompletionRequest};
use crate::transcript::TranscriptStore;
use crate::types::Turn;
use crate::window::{WindowAssembler, WindowUsage};

/// One completed prompt/reply round within a turn
#[derive(Debug, Clone)]
pub struct Exchange {
    /// The user (or synthesized) turn that was submitted
    pub prompt: Turn,
    /// The assistant's reply
    pub reply: Turn,
    /// Error notice for a tool call in this reply that failed
    ///
    /// Recorded in history for the model and carried here so the caller can
    /// show it; the reply alone would be raw marker text.
    pub notice: Option<Turn>,
    /// False when the turns could not be durably recorded
    pub persisted: bool,
}

/// The conversation engine
pub struct Agent {
    config: AgentConfig,
    profile: ModelProfile,
    store: TranscriptStore,
    assembler: WindowAssembler,
    client: Box<dyn CompletionClient>,
    dispatcher: Dispatcher,
    history: Vec<Turn>,
}

impl Agent {
    /// Wire up an agent from resolved configuration and collaborators
    ///
    /// Validates the model profile and budget up front. The persisted
    /// history is loaded once here; a transcript that cannot be read logs a
    /// warning and starts the session empty rather than refusing to run.
    pub fn new(
        config: AgentConfig,
        client: Box<dyn CompletionClient>,
        search: Box<dyn SearchClient>,
        fetcher: Box<dyn PageFetcher>,
    ) -> Result<Self> {
        let profile = config.profile()?;
        let budget = profile.history_budget();
        let assembler = WindowAssembler::new(Box::new(CharacterEstimator::new()), budget)?;

        // Tool results compete with real history for the window, so they
        // get at most half the budget.
        let dispatcher = Dispatcher::new(
            search,
            fetcher,
            Box::new(CharacterEstimator::new()),
            budget / 2,
        );

        let store = TranscriptStore::new(config.history_path.clone());
        let history = if config.use_history {
            match store.load() {
                Ok(turns) => turns,
                Err(err) => {
                    warn!(%err, "could not read history, starting empty");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            config,
            profile,
            store,
            assembler,
            client,
            dispatcher,
            history,
        })
    }

    /// The resolved configuration this agent runs with
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The full in-memory transcript, oldest first
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// The suffix of the transcript that currently fits the budget
    pub fn recent_window(&self) -> Vec<Turn> {
        self.assembler.assemble(&self.history, None, None)
    }

    /// The window and usage stats `run_turn` would submit for this input
    ///
    /// Backs the verbose echo: pure, no side effects.
    pub fn preview(&self, user_text: &str) -> (Vec<Turn>, WindowUsage) {
        let pending = Turn::user(user_text);
        let system = self.system_turn();
        let window = self
            .assembler
            .assemble(&self.history, system.as_ref(), Some(&pending));
        let usage = self
            .assembler
            .usage(&self.history, system.as_ref(), Some(&pending));
        (window, usage)
    }

    /// Drive one user input to completion
    ///
    /// Returns every exchange the turn produced, in order; the last one
    /// carries the reply to display. Persistence failure does not abort the
    /// turn: the exchange is flagged and the caller decides how loudly to
    /// complain.
    pub async fn run_turn(&mut self, user_text: &str) -> Result<Vec<Exchange>> {
        let system = self.system_turn();
        let mut pending = Turn::user(user_text);
        let mut exchanges = Vec::new();
        let mut depth = 0usize;

        loop {
            let window = self
                .assembler
                .assemble(&self.history, system.as_ref(), Some(&pending));
            let request = CompletionRequest {
                model: self.profile.name.to_string(),
                messages: window,
                max_tokens: self.profile.max_reply_tokens,
                temperature: TEMPERATURE,
            };

            let reply = Turn::assistant(self.client.complete(&request).await?);

            self.history.push(pending.clone());
            self.history.push(reply.clone());
            let persisted = self.persist(&[pending.clone(), reply.clone()]);
            exchanges.push(Exchange {
                prompt: pending,
                reply: reply.clone(),
                notice: None,
                persisted,
            });

            let call = match scan(&reply.content) {
                Some(call) if depth < MAX_TOOL_DEPTH => call,
                Some(_) => {
                    info!(depth, "tool depth exhausted, marker left unexecuted");
                    break;
                }
                None => break,
            };

            depth += 1;
            let outcome = self.dispatcher.dispatch(&call).await;
            if outcome.recurse {
                pending = outcome.turn;
            } else {
                // Failed action: record the notice so the model sees it next
                // turn and hand it to the caller for display, but do not
                // spend another completion on it now.
                self.history.push(outcome.turn.clone());
                let notice_persisted = self.persist(std::slice::from_ref(&outcome.turn));
                if let Some(last) = exchanges.last_mut() {
                    last.notice = Some(outcome.turn);
                    last.persisted = last.persisted && notice_persisted;
                }
                break;
            }
        }

        Ok(exchanges)
    }

    fn system_turn(&self) -> Option<Turn> {
        self.config
            .use_system
            .then(|| Turn::system(self.config.persona.clone()))
    }

    /// Append turns to the store; returns false on failure
    fn persist(&self, turns: &[Turn]) -> bool {
        if !self.config.use_history {
            return true;
        }
        match self.store.append(turns) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "exchange not durably recorded");
                false
            }
        }
    }
}
