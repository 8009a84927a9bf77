//! Application state management.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ServerConfig;
use crate::redeploy::RedeployClient;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::validator::{PortalTokenValidator, TokenValidator};

/// Application state shared across request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Session table.
    pub sessions: Arc<dyn SessionStore>,
    /// Token validator.
    pub validator: Arc<dyn TokenValidator>,
    /// Deployment API client.
    pub redeployer: RedeployClient,
    /// Start time.
    start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl AppState {
    /// Create state wired to the portal APIs described by `config`.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let sessions = Arc::new(InMemorySessionStore::new(
            config.sessions.lifetime_duration(),
        ));
        let validator = Arc::new(PortalTokenValidator::new(
            config.portal.clone(),
            config.permission_path.clone(),
            config.validation_timeout_duration(),
        )?);
        let redeployer =
            RedeployClient::new(config.portal.clone(), config.deployment_timeout_duration())?;

        Ok(Self::with_components(config, sessions, validator, redeployer))
    }

    /// Create state from explicit components.
    pub fn with_components(
        config: ServerConfig,
        sessions: Arc<dyn SessionStore>,
        validator: Arc<dyn TokenValidator>,
        redeployer: RedeployClient,
    ) -> Self {
        Self {
            config,
            sessions,
            validator,
            redeployer,
            start_time: Instant::now(),
        }
    }

    /// Start the background task that purges expired sessions.
    /// Call this after wrapping AppState in Arc.
    pub fn start_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(self);
        let cleanup_interval = state.config.sessions.sweep_interval_duration();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let purged = state.sessions.purge_expired();
                if purged > 0 {
                    tracing::debug!(
                        purged,
                        active = state.sessions.len(),
                        "Purged expired sessions"
                    );
                }
            }
        })
    }

    /// Get uptime duration.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
