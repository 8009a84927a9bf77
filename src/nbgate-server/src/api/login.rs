//! Login page and token exchange.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::Html,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::info;

use crate::config::SESSION_COOKIE;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::types::{StatusResponse, ValidateTokenRequest};

/// Page that collects a token from the embedding portal or from the user.
///
/// Embedded in a frame it posts `{type: "REQUEST_AUTH_TOKEN"}` to the parent
/// and waits for `{type: "AUTH_TOKEN", token}`, falling back to a manual form
/// after three seconds. At top level it shows the form immediately.
pub const LOGIN_PAGE: &str = include_str!("login.html");

/// `GET /auth`
pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

/// `POST /validate-token`: exchange an external token for a session cookie.
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<StatusResponse>)> {
    let Json(request) =
        payload.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;

    let token = request
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("No token provided".to_string()))?;

    if !state.validator.validate(Some(&token)).await.is_valid() {
        return Err(AppError::Authentication("Invalid token".to_string()));
    }

    let session_id = state.sessions.create(token);
    info!(active = state.sessions.len(), "Session created for validated token");

    let cookie = session_cookie(session_id, state.sessions.lifetime().num_seconds());
    Ok((jar.add(cookie), Json(StatusResponse::ok())))
}

/// Session cookie: TLS-only, hidden from scripts, usable inside the portal iframe.
pub fn session_cookie(session_id: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}
