//! Common utilities shared across the nbgate crates.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod http_client;
pub mod logging;
pub mod portal;
pub mod truncate;

pub use http_client::{
    COMMIT_TIMEOUT, DEFAULT_TIMEOUT, DEPLOYMENT_TIMEOUT, INTERNAL_TOKEN_TIMEOUT, USER_AGENT,
    VALIDATION_TIMEOUT, create_client_with_timeout,
};
pub use logging::setup_logging;
pub use portal::{
    APPLICATION_ID_VAR, DEPLOYMENT_ID_VAR, PORTAL_API_VAR, PortalConfig, WORKSPACE_ID_VAR,
};
pub use truncate::truncate_with_ellipsis;
