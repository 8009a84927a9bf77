//! HTTP middleware components.

use std::time::Instant;

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::{debug, error, info, warn};

/// Request timing header name.
pub const REQUEST_TIMING_HEADER: &str = "X-Response-Time";

/// Paths hit by the reverse proxy and sibling services on every request.
/// Logged at debug level so they do not drown user-facing traffic.
const GATE_PATHS: &[&str] = &["/internal-auth", "/internal-token", "/health"];

/// Timing middleware - tracks request duration and logs the outcome.
pub async fn timing_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    if let Ok(value) = HeaderValue::from_str(&format!("{duration_ms:.2}ms")) {
        response.headers_mut().insert(REQUEST_TIMING_HEADER, value);
    }

    let status = response.status();
    let duration_ms = format!("{duration_ms:.2}");
    if status.is_server_error() {
        error!(method = %method, path = %path, status = %status, duration_ms = %duration_ms, "Server error");
    } else if GATE_PATHS.contains(&path.as_str()) {
        debug!(method = %method, path = %path, status = %status, duration_ms = %duration_ms, "Gate request");
    } else if status.is_client_error() {
        warn!(method = %method, path = %path, status = %status, duration_ms = %duration_ms, "Client error");
    } else {
        info!(method = %method, path = %path, status = %status, duration_ms = %duration_ms, "Request completed");
    }

    response
}
