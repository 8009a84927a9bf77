//! Error types for the watcher.

use thiserror::Error;

/// Watcher error type.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// Stat or read of the watched file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The commit request could not be sent.
    #[error("Commit request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The commit API answered with a non-2xx status.
    #[error("Commit failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A setting needed to commit is missing.
    #[error("{0} not configured, skipping commit")]
    NotConfigured(&'static str),
}

impl WatcherError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type for the watcher.
pub type WatcherResult<T> = Result<T, WatcherError>;
