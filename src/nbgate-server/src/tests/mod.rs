//! Router-level tests driving the full HTTP surface in-process.


use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::DateTime;
use http_body_util::BodyExt;
use nbgate_common::PortalConfig;
use tower::ServiceExt;

use crate::clock::ManualClock;
use crate::config::{SESSION_COOKIE, ServerConfig};
use crate::redeploy::RedeployClient;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::state::AppState;
use crate::validator::{TokenValidator, Verdict};

pub(crate) const GOOD_TOKEN: &str = "good-token";

/// Accepts only [`GOOD_TOKEN`] and counts calls.
#[derive(Default)]
pub(crate) struct StubValidator {
    calls: AtomicUsize,
}

impl StubValidator {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenValidator for StubValidator {
    async fn validate(&self, token: Option<&str>) -> Verdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Verdict::from(token == Some(GOOD_TOKEN))
    }
}

pub(crate) struct Harness {
    pub state: Arc<AppState>,
    pub clock: ManualClock,
    pub validator: Arc<StubValidator>,
    peer: SocketAddr,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_portal(PortalConfig::default())
    }

    pub(crate) fn with_portal(portal: PortalConfig) -> Self {
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp"));
        let config = ServerConfig {
            portal: portal.clone(),
            ..ServerConfig::default()
        };
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::with_clock(
            config.sessions.lifetime_duration(),
            Arc::new(clock.clone()),
        ));
        let validator = Arc::new(StubValidator::default());
        let redeployer = RedeployClient::new(portal, Duration::from_secs(2)).expect("client");
        let state = Arc::new(AppState::with_components(
            config,
            sessions,
            validator.clone(),
            redeployer,
        ));
        Self {
            state,
            clock,
            validator,
            peer: SocketAddr::from(([127, 0, 0, 1], 40_000)),
        }
    }

    pub(crate) fn from_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = peer;
        self
    }

    fn router(&self) -> Router {
        crate::create_router_with_state(Arc::clone(&self.state)).layer(MockConnectInfo(self.peer))
    }

    pub(crate) async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router().oneshot(request).await.expect("infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Log in with [`GOOD_TOKEN`] and return the session id.
    pub(crate) async fn login(&self) -> String {
        let response = self.send(validate_request(GOOD_TOKEN)).await;
        assert_eq!(response.status, StatusCode::OK);
        response.session_cookie().expect("session cookie")
    }
}

pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub(crate) fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub(crate) fn set_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Value of the session cookie set by this response.
    pub(crate) fn session_cookie(&self) -> Option<String> {
        let set_cookie = self.set_cookie()?;
        let pair = set_cookie.split(';').next()?;
        pair.strip_prefix(&format!("{SESSION_COOKIE}="))
            .map(str::to_string)
    }
}

pub(crate) fn validate_request(token: &str) -> Request<Body> {
    json_request("/validate-token", serde_json::json!({ "token": token }))
}

pub(crate) fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

pub(crate) fn with_cookie(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .expect("request")
}
