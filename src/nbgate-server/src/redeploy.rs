//! Redeploy client: point a deployment at the latest code and restart it.
//!
//! The sequence is strictly ordered and never retried:
//! 1. `GET` the deployment descriptor,
//! 2. set `versionTag` to `"latest"` and `PUT` the descriptor back,
//! 3. `POST` the redeploy action.
//!
//! A failure at any step aborts the rest. Errors carry the failing
//! [`RedeployStep`]; a [`RedeployStep::Trigger`] failure means the deployment
//! was updated but not restarted.

use std::fmt;
use std::time::Duration;

use nbgate_common::{PORTAL_API_VAR, PortalConfig, WORKSPACE_ID_VAR, create_client_with_timeout};
use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Field of the deployment descriptor holding the code version.
pub const VERSION_TAG_FIELD: &str = "versionTag";

/// Version tag that makes the portal build from the latest commit.
pub const LATEST_VERSION_TAG: &str = "latest";

/// Maximum characters of an upstream error body kept in an error.
const MAX_DETAIL_CHARS: usize = 2048;

/// Step of the redeploy sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeployStep {
    /// `GET` of the deployment descriptor.
    Fetch,
    /// `PUT` of the modified descriptor.
    Update,
    /// `POST` of the redeploy action.
    Trigger,
}

impl fmt::Display for RedeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch deployment",
            Self::Update => "update deployment",
            Self::Trigger => "trigger redeploy",
        };
        f.write_str(name)
    }
}

/// Redeploy failure.
#[derive(Debug, Error)]
pub enum RedeployError {
    /// A required portal setting is missing.
    #[error("{0}")]
    Configuration(String),

    /// The request could not be sent or its body could not be read.
    #[error("{step} failed: {source}")]
    Transport {
        step: RedeployStep,
        #[source]
        source: reqwest::Error,
    },

    /// The portal answered with a non-2xx status.
    #[error("{step} failed with HTTP {status}: {detail}")]
    Status {
        step: RedeployStep,
        status: u16,
        detail: String,
    },

    /// The portal answered 2xx with a body that is not JSON.
    #[error("{step} returned invalid JSON: {source}")]
    Decode {
        step: RedeployStep,
        #[source]
        source: serde_json::Error,
    },

    /// The fetched descriptor is not a JSON object.
    #[error("Deployment descriptor is not a JSON object")]
    MalformedDeployment,
}

impl RedeployError {
    /// Step that failed, if the failure happened on the wire.
    pub fn step(&self) -> Option<RedeployStep> {
        match self {
            Self::Transport { step, .. } | Self::Status { step, .. } | Self::Decode { step, .. } => {
                Some(*step)
            }
            Self::MalformedDeployment => Some(RedeployStep::Fetch),
            Self::Configuration(_) => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Client for the portal deployment API.
#[derive(Clone)]
pub struct RedeployClient {
    client: Client,
    portal: PortalConfig,
}

impl fmt::Debug for RedeployClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedeployClient")
            .field("portal", &self.portal)
            .finish()
    }
}

impl RedeployClient {
    /// Create a client whose individual calls are bounded by `timeout`.
    pub fn new(portal: PortalConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = create_client_with_timeout(timeout).map_err(anyhow::Error::msg)?;
        Ok(Self { client, portal })
    }

    /// Set `deployment_id` to the latest version and redeploy it as the
    /// owner of `token`. Returns the JSON body of the redeploy call.
    pub async fn redeploy(&self, deployment_id: &str, token: &str) -> Result<Value, RedeployError> {
        let base = self.deployment_url(deployment_id)?;

        info!(deployment_id, "Fetching deployment");
        let response = self
            .client
            .get(&base)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| RedeployError::Transport {
                step: RedeployStep::Fetch,
                source,
            })?;
        let mut deployment = read_json(RedeployStep::Fetch, response).await?;

        let fields = deployment
            .as_object_mut()
            .ok_or(RedeployError::MalformedDeployment)?;
        fields.insert(
            VERSION_TAG_FIELD.to_string(),
            Value::String(LATEST_VERSION_TAG.to_string()),
        );

        info!(deployment_id, "Updating deployment to latest version");
        let response = self
            .client
            .put(&base)
            .bearer_auth(token)
            .json(&deployment)
            .send()
            .await
            .map_err(|source| RedeployError::Transport {
                step: RedeployStep::Update,
                source,
            })?;
        // Any 2xx update body is ignored, JSON or not.
        ensure_success(RedeployStep::Update, response).await?;

        info!(deployment_id, "Triggering redeploy");
        let response = self
            .client
            .post(format!("{base}/redeploy"))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|source| RedeployError::Transport {
                step: RedeployStep::Trigger,
                source,
            })?;
        let result = read_json(RedeployStep::Trigger, response)
            .await
            .inspect_err(|e| {
                warn!(deployment_id, error = %e, "Deployment updated but redeploy was not triggered");
            })?;

        info!(deployment_id, "Redeploy triggered");
        Ok(result)
    }

    fn deployment_url(&self, deployment_id: &str) -> Result<String, RedeployError> {
        let api_url = self.portal.api_url().ok_or_else(|| {
            RedeployError::Configuration(format!("{PORTAL_API_VAR} environment variable is not set"))
        })?;
        let workspace_id = self.portal.workspace_id().ok_or_else(|| {
            RedeployError::Configuration(format!(
                "{WORKSPACE_ID_VAR} environment variable is not set"
            ))
        })?;
        Ok(format!("{api_url}/{workspace_id}/deployments/{deployment_id}"))
    }
}

/// Check the status and decode the body. An empty 2xx body decodes as `null`.
async fn read_json(step: RedeployStep, response: Response) -> Result<Value, RedeployError> {
    let body = ensure_success(step, response).await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&body).map_err(|source| RedeployError::Decode { step, source })
}

/// Read the body, turning a non-2xx status into a `Status` error whose
/// detail is the truncated body.
async fn ensure_success(step: RedeployStep, response: Response) -> Result<Vec<u8>, RedeployError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|source| RedeployError::Transport { step, source })?;

    if !status.is_success() {
        let text = String::from_utf8_lossy(&body);
        let detail = if text.trim().is_empty() {
            status.canonical_reason().unwrap_or("no response body").to_string()
        } else {
            nbgate_common::truncate_with_ellipsis(text.trim(), MAX_DETAIL_CHARS).into_owned()
        };
        return Err(RedeployError::Status {
            step,
            status: status.as_u16(),
            detail,
        });
    }

    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEPLOYMENT_PATH: &str = "/ws-1/deployments/dep-1";
    const REDEPLOY_PATH: &str = "/ws-1/deployments/dep-1/redeploy";

    fn client(api_url: &str) -> RedeployClient {
        RedeployClient::new(
            PortalConfig {
                api_url: Some(api_url.to_string()),
                workspace_id: Some("ws-1".to_string()),
                ..Default::default()
            },
            Duration::from_secs(2),
        )
        .expect("client")
    }

    fn descriptor() -> Value {
        json!({
            "deploymentId": "dep-1",
            "name": "notebook",
            "versionTag": "v1.4.2",
            "resources": {"cpu": 200, "memory": 500},
            "variables": [{"name": "A", "value": "1"}]
        })
    }

    async fn mount_get(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(DEPLOYMENT_PATH))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(template)
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_full_sequence_sets_latest_and_returns_trigger_body() {
        let server = MockServer::start().await;
        mount_get(&server, ResponseTemplate::new(200).set_body_json(descriptor())).await;

        let mut expected = descriptor();
        expected["versionTag"] = json!("latest");
        Mock::given(method("PUT"))
            .and(path(DEPLOYMENT_PATH))
            .and(header("authorization", "Bearer user-token"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(200).set_body_json(&expected))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REDEPLOY_PATH))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .redeploy("dep-1", "user-token")
            .await
            .expect("redeploy");
        assert_eq!(result, json!({"status": "queued"}));
    }

    #[tokio::test]
    async fn test_plain_text_update_response_still_triggers() {
        let server = MockServer::start().await;
        mount_get(&server, ResponseTemplate::new(200).set_body_json(descriptor())).await;
        Mock::given(method("PUT"))
            .and(path(DEPLOYMENT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("Updated"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REDEPLOY_PATH))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .redeploy("dep-1", "user-token")
            .await
            .expect("redeploy");
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_version_tag_added_when_absent() {
        let server = MockServer::start().await;
        mount_get(&server, ResponseTemplate::new(200).set_body_json(json!({"name": "x"}))).await;
        Mock::given(method("PUT"))
            .and(path(DEPLOYMENT_PATH))
            .and(body_json(json!({"name": "x", "versionTag": "latest"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REDEPLOY_PATH))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .redeploy("dep-1", "user-token")
            .await
            .expect("redeploy");
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn test_put_failure_aborts_before_trigger() {
        let server = MockServer::start().await;
        mount_get(&server, ResponseTemplate::new(200).set_body_json(descriptor())).await;
        Mock::given(method("PUT"))
            .and(path(DEPLOYMENT_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REDEPLOY_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .redeploy("dep-1", "user-token")
            .await
            .expect_err("update must fail");

        assert_eq!(err.step(), Some(RedeployStep::Update));
        match err {
            RedeployError::Status { status, detail, .. } => {
                assert_eq!(status, 500);
                assert_eq!(detail, "database unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_failure_aborts_everything() {
        let server = MockServer::start().await;
        mount_get(&server, ResponseTemplate::new(404)).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .redeploy("dep-1", "user-token")
            .await
            .expect_err("fetch must fail");
        assert_eq!(err.step(), Some(RedeployStep::Fetch));
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("Not Found"));
    }

    #[tokio::test]
    async fn test_trigger_failure_reports_trigger_step() {
        let server = MockServer::start().await;
        mount_get(&server, ResponseTemplate::new(200).set_body_json(descriptor())).await;
        Mock::given(method("PUT"))
            .and(path(DEPLOYMENT_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REDEPLOY_PATH))
            .respond_with(ResponseTemplate::new(409).set_body_string("already deploying"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .redeploy("dep-1", "user-token")
            .await
            .expect_err("trigger must fail");
        assert_eq!(err.step(), Some(RedeployStep::Trigger));
        assert!(err.to_string().contains("already deploying"));
    }

    #[tokio::test]
    async fn test_non_object_descriptor_is_rejected() {
        let server = MockServer::start().await;
        mount_get(&server, ResponseTemplate::new(200).set_body_json(json!(["dep-1"]))).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .redeploy("dep-1", "user-token")
            .await
            .expect_err("array descriptor");
        assert!(matches!(err, RedeployError::MalformedDeployment));
    }

    #[tokio::test]
    async fn test_missing_configuration_is_distinct() {
        let client = RedeployClient::new(PortalConfig::default(), Duration::from_secs(1))
            .expect("client");
        let err = client
            .redeploy("dep-1", "user-token")
            .await
            .expect_err("unconfigured");
        assert!(err.is_configuration());
        assert_eq!(err.step(), None);
        assert!(err.to_string().contains(PORTAL_API_VAR));

        let client = RedeployClient::new(
            PortalConfig {
                api_url: Some("https://portal.example.com".to_string()),
                ..Default::default()
            },
            Duration::from_secs(1),
        )
        .expect("client");
        let err = client
            .redeploy("dep-1", "user-token")
            .await
            .expect_err("no workspace");
        assert!(err.to_string().contains(WORKSPACE_ID_VAR));
    }

    #[tokio::test]
    async fn test_network_error_is_transport() {
        let err = client("http://127.0.0.1:9")
            .redeploy("dep-1", "user-token")
            .await
            .expect_err("unreachable");
        assert!(matches!(
            err,
            RedeployError::Transport {
                step: RedeployStep::Fetch,
                ..
            }
        ));
    }
}
