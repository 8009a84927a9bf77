//! Server configuration.

use std::time::Duration;

use nbgate_common::PortalConfig;
use serde::{Deserialize, Serialize};

use crate::session::DEFAULT_SESSION_LIFETIME_SECS;
use crate::validator::DEFAULT_PERMISSION_PATH;

/// Name of the session cookie. Part of the embedding contract with the portal.
pub const SESSION_COOKIE: &str = "quix_session";

/// Longest accepted session lifetime in seconds (30 days).
pub const MAX_SESSION_LIFETIME_SECS: i64 = 30 * 24 * 60 * 60;

/// Environment variable overriding the listen address.
pub const LISTEN_ADDR_VAR: &str = "NBGATE_LISTEN_ADDR";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:8082").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Portal identifiers.
    #[serde(default)]
    pub portal: PortalConfig,

    /// Session configuration.
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Path of the permission query on the portal API.
    #[serde(default = "default_permission_path")]
    pub permission_path: String,

    /// Timeout of the token validation call in seconds.
    #[serde(default = "default_validation_timeout")]
    pub validation_timeout: u64,

    /// Timeout of each redeploy call in seconds.
    #[serde(default = "default_deployment_timeout")]
    pub deployment_timeout: u64,

    /// Reject `/internal-token` callers outside loopback and private networks.
    #[serde(default = "default_true")]
    pub restrict_internal_token: bool,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8082".to_string()
}

fn default_permission_path() -> String {
    DEFAULT_PERMISSION_PATH.to_string()
}

fn default_validation_timeout() -> u64 {
    nbgate_common::VALIDATION_TIMEOUT.as_secs()
}

fn default_deployment_timeout() -> u64 {
    nbgate_common::DEPLOYMENT_TIMEOUT.as_secs()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            portal: PortalConfig::default(),
            sessions: SessionConfig::default(),
            permission_path: default_permission_path(),
            validation_timeout: default_validation_timeout(),
            deployment_timeout: default_deployment_timeout(),
            restrict_internal_token: true,
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    ///
    /// Portal identifiers missing from the file are filled from the environment.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        let env = PortalConfig::from_env();
        let portal = &mut config.portal;
        portal.api_url = portal.api_url.take().or(env.api_url);
        portal.workspace_id = portal.workspace_id.take().or(env.workspace_id);
        portal.deployment_id = portal.deployment_id.take().or(env.deployment_id);
        portal.application_id = portal.application_id.take().or(env.application_id);
        Ok(config)
    }

    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            portal: PortalConfig::from_lookup(&lookup),
            ..Self::default()
        };
        if let Some(addr) = lookup(LISTEN_ADDR_VAR).filter(|a| !a.trim().is_empty()) {
            config.listen_addr = addr;
        }
        config
    }

    /// Reject settings that would break session handling at runtime.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.sessions.validate()
    }

    /// Get validation timeout as Duration.
    pub fn validation_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.validation_timeout)
    }

    /// Get deployment call timeout as Duration.
    pub fn deployment_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.deployment_timeout)
    }
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds, also used as the cookie max-age.
    #[serde(default = "default_session_lifetime")]
    pub lifetime: i64,
    /// Interval of the background expiry sweep in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
}

fn default_session_lifetime() -> i64 {
    DEFAULT_SESSION_LIFETIME_SECS
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: default_session_lifetime(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl SessionConfig {
    /// The lifetime must be positive and at most [`MAX_SESSION_LIFETIME_SECS`].
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_SESSION_LIFETIME_SECS).contains(&self.lifetime) {
            anyhow::bail!(
                "sessions.lifetime must be between 1 and {} seconds, got {}",
                MAX_SESSION_LIFETIME_SECS,
                self.lifetime
            );
        }
        Ok(())
    }

    pub fn lifetime_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lifetime)
    }

    pub fn sweep_interval_duration(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }
}
