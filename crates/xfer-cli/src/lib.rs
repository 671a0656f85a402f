//! Command-line front end for xferd.
//!
//! `xferd serve` runs the HTTP service; `xferd fetch` runs one session
//! in-process and shows its progress.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only
use dotenvy as _;

pub mod commands;
pub mod handlers;
pub mod logging;
pub mod parser;

// Re-export primary types for convenient access
pub use commands::Commands;
pub use logging::init_logging;
pub use parser::Cli;
