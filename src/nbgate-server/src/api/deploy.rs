//! Redeploy trigger.

use std::sync::Arc;

use axum::{Json, extract::State};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::config::SESSION_COOKIE;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::types::RedeployResponse;

/// `POST /redeploy`: redeploy this service at the latest version, acting as
/// the session's user.
pub async fn redeploy(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> AppResult<Json<RedeployResponse>> {
    let token = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.token_for(cookie.value()))
        .ok_or_else(|| AppError::Authentication("Not authenticated".to_string()))?;

    let deployment_id = state
        .config
        .portal
        .deployment_id()
        .ok_or_else(|| AppError::Configuration("Deployment ID not configured".to_string()))?;

    info!(deployment_id, "Redeploy requested");
    let result = state.redeployer.redeploy(deployment_id, &token).await?;

    Ok(Json(RedeployResponse {
        status: "redeploying".to_string(),
        result,
    }))
}
