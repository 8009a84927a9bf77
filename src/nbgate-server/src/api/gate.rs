//! Internal endpoints: the reverse proxy gate and the token broker.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use crate::config::SESSION_COOKIE;
use crate::error::AppError;
use crate::state::AppState;

use super::types::TokenResponse;

/// `GET /internal-auth`: 200 for a valid session cookie, 401 otherwise.
///
/// Consumed by the reverse proxy `auth_request` subrequest; never answers
/// with any other status and never carries a body.
pub async fn internal_auth(State(state): State<Arc<AppState>>, jar: CookieJar) -> StatusCode {
    let valid = jar
        .get(SESSION_COOKIE)
        .is_some_and(|cookie| state.sessions.is_valid(cookie.value()));

    if valid {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

/// `GET /internal-token`: token of the most recently created live session.
///
/// Only for sibling services on the local network.
pub async fn internal_token(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    if state.config.restrict_internal_token && !is_internal(peer.ip()) {
        warn!(peer = %peer, "Rejected internal token request from external address");
        return AppError::Forbidden("Internal endpoint".to_string()).into_response();
    }

    match state.sessions.most_recent_valid_token() {
        Some(token) => {
            debug!(peer = %peer, "Served brokered token");
            Json(TokenResponse { token: Some(token) }).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(TokenResponse { token: None })).into_response(),
    }
}

/// Loopback, private, link-local and unique-local addresses.
pub fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_internal(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
