//! File-change notifier.
//!
//! Polls one file once per second and, whenever it appears or its
//! modification time changes, pushes its content to the portal commit API
//! using the token brokered by the gate server's `/internal-token` endpoint.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod commit;
pub mod config;
pub mod error;
pub mod state;
pub mod token;
pub mod watcher;

pub use commit::CommitClient;
pub use config::WatcherConfig;
pub use error::{WatcherError, WatcherResult};
pub use state::{FileState, Transition};
pub use token::TokenSource;
pub use watcher::FileWatcher;
