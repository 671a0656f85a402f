//! Axum web server adapter for xferd.
//!
//! Exposes the session service over HTTP: start, restart, progress and
//! cancel; completed-artifact listing and download; a media listing of the
//! download root; and an SSE stream of session events. Optional Basic auth
//! guards everything under `/api`.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings (used by integration tests)
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tower as _;

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use auth::{CredentialParseError, Credentials};
pub use bootstrap::{
    AxumContext, CorsConfig, ServerConfig, bootstrap, bootstrap_with_engine, start_server,
};
pub use error::HttpError;
pub use routes::{create_router, create_spa_router};
pub use sse::SseBroadcaster;
pub use state::AppState;
