//! The florence shell
//!
//! Resolves configuration, wires the agent, and drives either a one-shot
//! exchange or the interactive read loop. Exit codes: 0 on success, 1 on a
//! fatal configuration or provider error, 2 when an answer was produced but
//! could not be durably recorded.

use std::io::{IsTerminal, Read};
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};

use florence_core::{
    Agent, AgentConfig, CompletionClient, Error, Turn, Vendor, ASSISTANT_NAME,
};
use florence_tools::{HttpFetcher, HttpSearchClient, Speaker};

const EXIT_FATAL: u8 = 1;
const EXIT_DEGRADED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "florence", version, about = "A conversational assistant for your terminal")]
pub struct Cli {
    /// The message, as free words; reads stdin instead when piped
    pub words: Vec<String>,

    /// Model to talk to
    #[arg(short, long)]
    pub model: Option<String>,

    /// Echo the assembled context window before each request
    #[arg(short, long)]
    pub verbose: bool,

    /// Neither read nor write the history file
    #[arg(long)]
    pub no_history: bool,

    /// Skip the system persona turn
    #[arg(long)]
    pub no_system: bool,

    /// Speak replies through the local TTS command
    #[arg(long)]
    pub speak: bool,

    /// Keep a conversation going in a read loop
    #[arg(short, long)]
    pub interactive: bool,
}

/// Inputs that short-circuit to a local action instead of a completion
enum Reserved {
    /// Print the full persisted transcript
    History,
    /// Print the transcript suffix that currently fits the budget
    Recent,
}

fn reserved(input: &str) -> Option<Reserved> {
    match input.trim().to_lowercase().as_str() {
        "history" => Some(Reserved::History),
        "recent" => Some(Reserved::Recent),
        _ => None,
    }
}

/// Entry point for the binary
pub async fn run(cli: Cli) -> ExitCode {
    tokio::select! {
        code = session(cli) => code,
        _ = shutdown_signal() => {
            info!("interrupted, exiting");
            ExitCode::SUCCESS
        }
    }
}

async fn session(cli: Cli) -> ExitCode {
    let mut config = AgentConfig::from_env();
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    config.verbose = config.verbose || cli.verbose;
    config.use_history = config.use_history && !cli.no_history;
    config.use_system = config.use_system && !cli.no_system;

    let agent = match build_agent(config) {
        Ok(agent) => agent,
        Err(err) => {
            eprintln!("florence: {err}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match gather_input(&cli) {
        Some(input) => one_shot(agent, &input, cli.speak).await,
        None => interactive(agent, cli.speak).await,
    }
}

/// Construct the agent with the provider the model's vendor requires
fn build_agent(config: AgentConfig) -> Result<Agent, Error> {
    let api_key = config.require_api_key()?;
    let client: Box<dyn CompletionClient> = match config.profile()?.vendor {
        Vendor::OpenAi => Box::new(florence_core::OpenAiClient::new(api_key)),
        Vendor::Anthropic => Box::new(florence_core::AnthropicClient::new(api_key)),
    };
    Agent::new(
        config,
        client,
        Box::new(HttpSearchClient::new()),
        Box::new(HttpFetcher::new()),
    )
}

/// Resolve the one-shot input, or None for interactive mode
///
/// Words on the command line win. With no words and piped stdin, the piped
/// text is the message. Otherwise the session is interactive, whether or
/// not `-i` was given.
fn gather_input(cli: &Cli) -> Option<String> {
    if cli.interactive {
        return None;
    }
    if !cli.words.is_empty() {
        return Some(cli.words.join(" "));
    }
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return None;
    }
    let mut piped = String::new();
    if stdin.read_to_string(&mut piped).is_err() {
        return None;
    }
    let piped = piped.trim().to_string();
    (!piped.is_empty()).then_some(piped)
}

async fn one_shot(mut agent: Agent, input: &str, speak: bool) -> ExitCode {
    match reserved(input) {
        Some(Reserved::History) => {
            print_turns(agent.history());
            return ExitCode::SUCCESS;
        }
        Some(Reserved::Recent) => {
            print_turns(&agent.recent_window());
            return ExitCode::SUCCESS;
        }
        None => {}
    }

    match submit(&mut agent, input, speak).await {
        Ok(degraded) if degraded => ExitCode::from(EXIT_DEGRADED),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("florence: {err}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn interactive(mut agent: Agent, speak: bool) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("florence: could not open terminal: {err}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let mut degraded = false;
    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("florence: {err}");
                return ExitCode::from(EXIT_FATAL);
            }
        };

        // A blank line nudges the model to keep going.
        let input = if line.trim().is_empty() {
            "continue".to_string()
        } else {
            let _ = editor.add_history_entry(&line);
            line
        };

        match reserved(&input) {
            Some(Reserved::History) => {
                print_turns(agent.history());
                continue;
            }
            Some(Reserved::Recent) => {
                print_turns(&agent.recent_window());
                continue;
            }
            None => {}
        }

        match submit(&mut agent, &input, speak).await {
            Ok(was_degraded) => degraded = degraded || was_degraded,
            Err(err) => {
                // Provider trouble ends the turn, not the session.
                eprintln!("florence: {err}");
            }
        }
    }

    if degraded {
        ExitCode::from(EXIT_DEGRADED)
    } else {
        ExitCode::SUCCESS
    }
}

/// Run one input through the agent and display the result
///
/// Returns whether any exchange failed to persist.
async fn submit(agent: &mut Agent, input: &str, speak: bool) -> Result<bool, Error> {
    if agent.config().verbose {
        echo_window(agent, input);
    }

    let exchanges = agent.run_turn(input).await?;
    let mut degraded = false;
    for exchange in &exchanges {
        degraded = degraded || !exchange.persisted;
    }

    if let Some(last) = exchanges.last() {
        println!("{}", last.reply.content);
        if let Some(notice) = &last.notice {
            println!("{}", notice.content);
        }
        if speak {
            Speaker::new().say(&last.reply.content).await;
        }
    }
    if degraded {
        warn!("this exchange was not saved to the history file");
    }
    Ok(degraded)
}

/// Print the window the next request would carry, with usage stats
fn echo_window(agent: &Agent, input: &str) {
    let (window, usage) = agent.preview(input);
    eprintln!("--- context window ---");
    for turn in &window {
        eprintln!("[{}] {}", turn.role, turn.content);
    }
    eprintln!(
        "--- {} of {} history turns, ~{}/{} tokens ---",
        usage.selected_turns, usage.total_turns, usage.estimated_tokens, usage.budget
    );
}

fn print_turns(turns: &[Turn]) {
    if turns.is_empty() {
        println!("(no history)");
        return;
    }
    for turn in turns {
        let speaker = match turn.role {
            florence_core::Role::Assistant => ASSISTANT_NAME,
            _ => "you",
        };
        println!("{speaker}: {}", turn.content);
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
