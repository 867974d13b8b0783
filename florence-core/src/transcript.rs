//! Persistent conversation transcript
//!
//! The transcript is an append-only JSONL file: one `{"role", "content"}`
//! object per line, newline-terminated, oldest first. There are no updates
//! and no deletes; history is write-once per record.
//!
//! A single process owns the file. Concurrent appends from multiple
//! processes are unsupported.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::types::Turn;

/// Errors from transcript persistence
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// The history file could not be opened or written
    #[error("history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File-backed append-only transcript store
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    path: PathBuf,
}

impl TranscriptStore {
    /// Create a store backed by `path`
    ///
    /// The file is created lazily on first append; a missing file loads as
    /// an empty transcript.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full history, oldest first
    ///
    /// Lines that fail to parse are skipped with a warning; one corrupt
    /// record never loses the rest of the history.
    pub fn load(&self) -> Result<Vec<Turn>, TranscriptError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(TranscriptError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let mut turns = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| TranscriptError::Io {
                path: self.path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Turn>(&line) {
                Ok(turn) => turns.push(turn),
                Err(err) => {
                    warn!(
                        line = line_no + 1,
                        path = %self.path.display(),
                        %err,
                        "skipping malformed history record"
                    );
                }
            }
        }

        debug!(turns = turns.len(), path = %self.path.display(), "loaded transcript");
        Ok(turns)
    }

    /// Append turns to the history file
    ///
    /// Each turn is written as one newline-terminated JSON object. On error
    /// the caller must treat the whole batch as not durably recorded; the
    /// turns remain usable in memory for the current exchange.
    pub fn append(&self, turns: &[Turn]) -> Result<(), TranscriptError> {
        if turns.is_empty() {
            return Ok(());
        }

        let io_err = |source| TranscriptError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;

        let mut buf = String::new();
        for turn in turns {
            // serde_json can only fail here on non-string keys, which Turn
            // cannot produce
            let line = serde_json::to_string(turn).expect("turn serializes");
            buf.push_str(&line);
            buf.push('\n');
        }

        file.write_all(buf.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        debug!(appended = turns.len(), path = %self.path.display(), "persisted turns");
        Ok(())
    }
}
