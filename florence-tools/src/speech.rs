//! Speech output
//!
//! Speaks a reply by shelling out to a local text-to-speech command: `say`
//! on macOS, `espeak` elsewhere. Speech is decoration on top of the printed
//! reply, so every failure here is a warning, never an error the caller has
//! to handle.

use tokio::process::Command;
use tracing::{debug, warn};

/// Default TTS command for this platform
fn default_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak"
    }
}

/// Shells out to a local text-to-speech command
pub struct Speaker {
    command: String,
}

impl Default for Speaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Speaker {
    pub fn new() -> Self {
        Self {
            command: default_command().to_string(),
        }
    }

    /// Use a specific TTS command instead of the platform default
    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Speak the text, waiting for the command to finish
    pub async fn say(&self, text: &str) {
        match Command::new(&self.command).arg(text).status().await {
            Ok(status) if status.success() => {
                debug!(command = %self.command, "spoke reply");
            }
            Ok(status) => {
                warn!(command = %self.command, %status, "speech command failed");
            }
            Err(err) => {
                warn!(command = %self.command, %err, "speech command did not start");
            }
        }
    }
}
