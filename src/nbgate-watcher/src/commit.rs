//! Pushes the watched file's content to the portal commit API.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, info};

use nbgate_common::{create_client_with_timeout, truncate_with_ellipsis};

use crate::error::{WatcherError, WatcherResult};

/// API version header expected by the commit endpoint.
pub const API_VERSION_HEADER: &str = "X-Version";
pub const API_VERSION: &str = "2.0";

const MAX_LOGGED_BODY: usize = 2048;

/// Commit API client.
#[derive(Clone)]
pub struct CommitClient {
    client: reqwest::Client,
}

impl CommitClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = create_client_with_timeout(timeout)
            .map_err(anyhow::Error::msg)
            .context("commit client")?;
        Ok(Self { client })
    }

    /// Upload the raw bytes of `content` to `url`, declared as plain text.
    ///
    /// The bearer header is sent only when a token is available; the commit
    /// is still attempted without one.
    pub async fn commit(
        &self,
        url: &str,
        content: Vec<u8>,
        token: Option<&str>,
    ) -> WatcherResult<()> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/plain")
            .header(ACCEPT, "text/plain")
            .header(API_VERSION_HEADER, API_VERSION)
            .body(content);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        } else {
            debug!("Committing without a brokered token");
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(WatcherError::Status {
                status: status.as_u16(),
                body: truncate_with_ellipsis(&body, MAX_LOGGED_BODY).into_owned(),
            });
        }

        info!(
            %status,
            response = %truncate_with_ellipsis(&body, MAX_LOGGED_BODY),
            "Commit accepted"
        );
        Ok(())
    }
}
