//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /validate-token`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Generic status acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Body of `GET /internal-token`. `token` is `null` when no session is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
}

/// Body of a successful `POST /redeploy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeployResponse {
    pub status: String,
    /// Response of the portal redeploy action, passed through untouched.
    pub result: Value,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
}
