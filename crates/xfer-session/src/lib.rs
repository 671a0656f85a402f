//! Session coordination for xferd.
//!
//! Owns the live state of every transfer session and the workers that drive
//! them. Adapters talk to [`SessionManager`] through
//! [`xfer_core::SessionServicePort`].
//!
//! # Structure
//!
//! - `registry` - authoritative session table with lease-checked mutations
//! - `artifacts` - index of completed sessions and their files
//! - `worker` - resolve, stream and finalize one session
//! - `manager` - the service boundary; spawns and tracks workers
//! - `progress` - event throttling
#![deny(unused_crate_dependencies)]

pub mod artifacts;
mod manager;
pub(crate) mod progress;
pub mod registry;
mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use artifacts::ArtifactIndex;
pub use manager::{SessionManager, SessionManagerDeps, build_session_manager};
pub use progress::ProgressThrottle;
pub use registry::{LeaseId, SessionLease, SessionRegistry, TerminalOutcome};
pub use worker::{SessionJob, WorkerDeps, run_session};
