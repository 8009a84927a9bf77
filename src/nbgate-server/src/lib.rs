//! nbgate server - session gate in front of an embedded notebook.
//!
//! This crate provides:
//! - a login page that obtains a portal token from the embedding frame
//! - token validation against the portal and cookie-backed sessions
//! - an `auth_request` gate for the reverse proxy
//! - a token broker for sibling services on the local network
//! - a redeploy trigger acting with the signed-in user's token

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod middleware;
pub mod redeploy;
pub mod session;
pub mod state;
pub mod validator;

#[cfg(test)]
mod tests;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::{SESSION_COOKIE, ServerConfig};
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if config.portal.api_url().is_none() || config.portal.workspace_id().is_none() {
        warn!("Portal API or workspace id not configured; every token will be rejected");
    }
    if config.portal.deployment_id().is_none() {
        warn!("Deployment id not configured; redeploy requests will fail");
    }

    let addr: SocketAddr = config.listen_addr.parse()?;
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout);

    let state = Arc::new(AppState::new(config)?);
    let cleanup = state.start_cleanup_task();
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Starting nbgate server on {}", addr);

    // Signal fired once the shutdown future resolves, starting the drain deadline.
    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let signal = async move {
        shutdown.await;
        let _ = draining_tx.send(());
    };

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal)
    .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = async {
            if draining_rx.await.is_ok() {
                tokio::time::sleep(shutdown_timeout).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "In-flight requests did not finish before the shutdown timeout"
            );
        }
    }

    cleanup.abort();
    Ok(())
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

/// Create the application router with an Arc-wrapped state.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    api::routes()
        .layer(axum::middleware::from_fn(middleware::timing_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
