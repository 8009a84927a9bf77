//! Portal platform settings read from the deployment environment.
//!
//! The portal injects these variables into every deployment it runs. Empty
//! values are treated exactly like missing ones: a gate without a workspace id
//! must fail closed rather than validate tokens against an empty resource.

use serde::{Deserialize, Serialize};

/// Portal API base URL.
pub const PORTAL_API_VAR: &str = "Quix__Portal__Api";
/// Workspace the deployment belongs to.
pub const WORKSPACE_ID_VAR: &str = "Quix__Workspace__Id";
/// Deployment running the gate, used for redeploys.
pub const DEPLOYMENT_ID_VAR: &str = "Quix__Deployment__Id";
/// Application whose files the watcher commits to.
pub const APPLICATION_ID_VAR: &str = "Quix__Application__Id";

/// Portal identifiers shared by the gate server and the watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal API base URL.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Workspace identifier.
    #[serde(default)]
    pub workspace_id: Option<String>,
    /// Deployment identifier.
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// Application identifier.
    #[serde(default)]
    pub application_id: Option<String>,
}

impl PortalConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_url: lookup(PORTAL_API_VAR),
            workspace_id: lookup(WORKSPACE_ID_VAR),
            deployment_id: lookup(DEPLOYMENT_ID_VAR),
            application_id: lookup(APPLICATION_ID_VAR),
        }
    }

    /// Portal API base URL without a trailing slash.
    pub fn api_url(&self) -> Option<&str> {
        non_empty(&self.api_url).map(|url| url.trim_end_matches('/'))
    }

    pub fn workspace_id(&self) -> Option<&str> {
        non_empty(&self.workspace_id)
    }

    pub fn deployment_id(&self) -> Option<&str> {
        non_empty(&self.deployment_id)
    }

    pub fn application_id(&self) -> Option<&str> {
        non_empty(&self.application_id)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
