//! HTTP request handlers for the Axum web server.
//!
//! Handlers are thin wrappers that delegate to `SessionServicePort`.

pub mod artifacts;
pub mod events;
pub mod files;
pub mod sessions;
