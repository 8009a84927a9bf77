//! Token validation against the portal identity API.
//!
//! The validator fails closed: a missing token, a missing portal setting, a
//! transport error, a non-2xx status or an unparseable body all produce
//! [`Verdict::Invalid`]. Diagnostics go to the log, never to the caller.

use std::time::Duration;

use async_trait::async_trait;
use nbgate_common::{PortalConfig, create_client_with_timeout};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Resource type the token must grant access to.
pub const RESOURCE_TYPE: &str = "Workspace";

/// Permission the token must hold on the workspace.
pub const REQUIRED_PERMISSION: &str = "Read";

/// Default path of the permission query, relative to the portal API.
pub const DEFAULT_PERMISSION_PATH: &str = "auth/permissions/query";

/// Outcome of a token validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
}

impl Verdict {
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl From<bool> for Verdict {
    fn from(valid: bool) -> Self {
        if valid { Self::Valid } else { Self::Invalid }
    }
}

/// Decides whether an external token may open a session.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate `token`. Never errors; every failure is [`Verdict::Invalid`].
    async fn validate(&self, token: Option<&str>) -> Verdict;
}

/// Validator backed by the portal permission API.
#[derive(Clone)]
pub struct PortalTokenValidator {
    client: Client,
    portal: PortalConfig,
    permission_path: String,
}

impl std::fmt::Debug for PortalTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalTokenValidator")
            .field("portal", &self.portal)
            .field("permission_path", &self.permission_path)
            .finish()
    }
}

impl PortalTokenValidator {
    /// Create a validator whose permission call is bounded by `timeout`.
    pub fn new(
        portal: PortalConfig,
        permission_path: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = create_client_with_timeout(timeout).map_err(anyhow::Error::msg)?;
        Ok(Self {
            client,
            portal,
            permission_path: permission_path.into(),
        })
    }

    fn permission_url(&self, api_url: &str) -> String {
        format!("{}/{}", api_url, self.permission_path.trim_start_matches('/'))
    }
}

#[async_trait]
impl TokenValidator for PortalTokenValidator {
    async fn validate(&self, token: Option<&str>) -> Verdict {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            info!("Token validation failed: no token provided");
            return Verdict::Invalid;
        };

        let (Some(api_url), Some(workspace_id)) =
            (self.portal.api_url(), self.portal.workspace_id())
        else {
            warn!("Token validation failed: portal API or workspace id not configured");
            return Verdict::Invalid;
        };

        let url = self.permission_url(api_url);
        debug!(url = %url, workspace_id, "Validating token against portal API");

        let response = match self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("resourceType", RESOURCE_TYPE),
                ("resourceID", workspace_id),
                ("permissions", REQUIRED_PERMISSION),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token validation failed: identity API unreachable");
                return Verdict::Invalid;
            }
        };

        let status = response.status();
        if !status.is_success() {
            info!(status = %status, "Token validation rejected by identity API");
            return Verdict::Invalid;
        }

        match response.json::<Value>().await {
            Ok(body) => {
                let verdict = Verdict::from(is_truthy(&body));
                info!(valid = verdict.is_valid(), "Token validation result");
                verdict
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed: malformed identity API response");
                Verdict::Invalid
            }
        }
    }
}

/// Truthiness of a permission payload.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
