//! Error types for the gate server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::redeploy::RedeployError;

/// Application error type.
///
/// Authentication failures deliberately carry only a short, fixed message:
/// the caller learns that a token or session was rejected, never why.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required setting is missing.
    #[error("{0}")]
    Configuration(String),

    /// Missing or invalid token or session.
    #[error("{0}")]
    Authentication(String),

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Caller is not allowed to reach this endpoint.
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// An upstream portal API failed.
    #[error("{0}")]
    Upstream(String),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Authentication(_) => "authentication_failed",
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Upstream(_) => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response body.
///
/// `detail` is what the login page displays.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            detail: self.to_string(),
            code: self.error_code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for the gate server.
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error.to_string())
    }
}

impl From<RedeployError> for AppError {
    fn from(error: RedeployError) -> Self {
        match error {
            RedeployError::Configuration(message) => Self::Configuration(message),
            other => Self::Upstream(other.to_string()),
        }
    }
}
