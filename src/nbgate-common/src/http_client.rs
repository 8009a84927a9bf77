//! Centralized HTTP client factory for outbound portal calls.
//!
//! Every outbound call made by the gate carries an explicit timeout so a
//! stuck upstream cannot pin a request handler or the watcher loop.

use reqwest::Client;
use std::time::Duration;

/// User-Agent string for all HTTP requests
pub const USER_AGENT: &str = concat!("nbgate/", env!("CARGO_PKG_VERSION"));

/// Default timeout for standard API requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the permission check against the identity API (10 seconds)
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for each call of the redeploy sequence (30 seconds)
pub const DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for fetching the brokered token from the gate (5 seconds)
pub const INTERNAL_TOKEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for pushing file content to the commit API (30 seconds)
pub const COMMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection pool idle timeout so DNS is re-resolved periodically.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates an HTTP client with a custom timeout.
///
/// All clients include:
/// - User-Agent: `nbgate/{version}`
/// - tcp_nodelay: true
/// - pool_idle_timeout: 60s
/// - the specified overall timeout, also bounding connect
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client, String> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .tcp_nodelay(true)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {e}"))
}
