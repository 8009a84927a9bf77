//! Polling loop over the watched file.

use std::io::ErrorKind;
use std::time::SystemTime;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::commit::CommitClient;
use crate::config::WatcherConfig;
use crate::error::{WatcherError, WatcherResult};
use crate::state::{FileState, Transition};
use crate::token::TokenSource;

/// Watches one file and commits each new version to the portal.
pub struct FileWatcher {
    config: WatcherConfig,
    tokens: TokenSource,
    committer: CommitClient,
    state: FileState,
}

impl FileWatcher {
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let tokens = TokenSource::new(config.auth_proxy_url.clone(), config.token_timeout)?;
        let committer = CommitClient::new(config.commit_timeout)?;
        Ok(Self {
            config,
            tokens,
            committer,
            state: FileState::Absent,
        })
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    /// Record the current file state without committing it.
    ///
    /// A file that already exists at startup is not pushed; only later
    /// changes are.
    pub async fn prime(&mut self) -> WatcherResult<()> {
        let mtime = self.modified().await?;
        self.state = FileState::from_mtime(mtime);
        match mtime {
            Some(m) => info!(
                path = %self.config.watch_file.display(),
                mtime = ?m,
                "Watched file present"
            ),
            None => info!(
                path = %self.config.watch_file.display(),
                "Watched file does not exist yet"
            ),
        }
        Ok(())
    }

    /// One poll: stat the file, then commit on creation or modification.
    ///
    /// A failed commit is logged and not retried until the next change.
    pub async fn poll_once(&mut self) -> WatcherResult<Transition> {
        let mtime = self.modified().await?;
        let transition = self.state.observe(mtime);

        match transition {
            Transition::Created | Transition::Modified => {
                info!(
                    path = %self.config.watch_file.display(),
                    change = ?transition,
                    "Watched file changed"
                );
                if let Err(e) = self.commit().await {
                    match e {
                        WatcherError::NotConfigured(_) => warn!("{}", e),
                        _ => error!(error = %e, "Commit failed"),
                    }
                }
            }
            Transition::Deleted => {
                info!(path = %self.config.watch_file.display(), "Watched file deleted");
            }
            Transition::Unchanged => {}
        }

        Ok(transition)
    }

    /// Poll forever, backing off after unexpected errors.
    pub async fn run(mut self) {
        info!(
            path = %self.config.watch_file.display(),
            auth_proxy = %self.tokens.url(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting file watcher"
        );
        if self.config.commit_url().is_err() {
            warn!("Portal settings incomplete; changes will be detected but not committed");
        }

        if let Err(e) = self.prime().await {
            error!(error = %e, "Initial stat failed");
        }

        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            if let Err(e) = self.poll_once().await {
                error!(error = %e, "Watcher error");
                tokio::time::sleep(self.config.error_backoff).await;
            }
        }
    }

    /// Poll until `shutdown` resolves. A `shutdown` that never resolves keeps
    /// the watcher running for the life of the process.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => {
                info!("Stopping file watcher");
            }
        }
    }

    async fn commit(&self) -> WatcherResult<()> {
        let url = self
            .config
            .commit_url()
            .map_err(WatcherError::NotConfigured)?;

        let path = &self.config.watch_file;
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| WatcherError::io(path, e))?;

        let token = self.tokens.fetch().await;
        debug!(url = %url, has_token = token.is_some(), bytes = content.len(), "Committing file");
        self.committer.commit(&url, content, token.as_deref()).await
    }

    async fn modified(&self) -> WatcherResult<Option<SystemTime>> {
        let path = &self.config.watch_file;
        match tokio::fs::metadata(path).await {
            Ok(meta) => meta
                .modified()
                .map(Some)
                .map_err(|e| WatcherError::io(path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WatcherError::io(path, e)),
        }
    }
}
