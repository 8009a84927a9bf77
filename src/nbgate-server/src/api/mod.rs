//! HTTP routes and handlers.

mod deploy;
mod gate;
mod health;
mod login;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub use gate::is_internal;
pub use login::{LOGIN_PAGE, session_cookie};
pub use types::{HealthResponse, RedeployResponse, StatusResponse, TokenResponse};

/// Create the routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Login
        .route("/auth", get(login::login_page))
        .route("/validate-token", post(login::validate_token))
        // Reverse proxy gate and token broker
        .route("/internal-auth", get(gate::internal_auth))
        .route("/internal-token", get(gate::internal_token))
        // Deployment
        .route("/redeploy", post(deploy::redeploy))
        // Health
        .route("/health", get(health::health_check))
}
