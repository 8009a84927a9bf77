//! Brokered token lookup against the gate server.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use nbgate_common::create_client_with_timeout;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Fetches the token of the most recent live session from `/internal-token`.
#[derive(Clone)]
pub struct TokenSource {
    client: reqwest::Client,
    url: String,
}

impl TokenSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = create_client_with_timeout(timeout)
            .map_err(anyhow::Error::msg)
            .context("token client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current brokered token, or `None` when no session is live or the gate
    /// cannot be reached.
    pub async fn fetch(&self) -> Option<String> {
        let response = match self.client.get(&self.url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %self.url, error = %e, "Token broker unreachable");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url = %self.url, %status, "No brokered token available");
            return None;
        }

        match response.json::<TokenResponse>().await {
            Ok(body) => body.token.filter(|t| !t.is_empty()),
            Err(e) => {
                debug!(url = %self.url, error = %e, "Malformed token broker response");
                None
            }
        }
    }
}
