//! Concrete transfer engines for xferd.
//!
//! Every engine implements [`xfer_core::TransferEngine`]. The session worker
//! never sees which one it is talking to; [`SchemeRouter`] picks one by the
//! locator's scheme.
//!
//! # Engines
//!
//! - [`HttpEngine`] - `http://` and `https://` locators, one file per URL
//! - [`LocalEngine`] - `file://` locators and plain paths, files or directories
#![deny(unused_crate_dependencies)]

mod config;
mod http;
mod local;
mod router;

pub use config::HttpEngineConfig;
pub use http::{HttpEngine, file_name_from_url};
pub use local::LocalEngine;
pub use router::SchemeRouter;

// Silence unused dev-dependency warnings
#[cfg(test)]
use axum as _;
