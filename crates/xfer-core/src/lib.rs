//! Core domain types and port definitions for xferd.
//!
//! This crate holds the pure vocabulary of the session-coordination
//! subsystem: identifiers, state machine, progress arithmetic, errors,
//! events, and the traits (ports) that concrete engines and adapters
//! implement. No I/O, networking, or runtime dependencies live here.
//!
//! # Structure
//!
//! - `session` - ids, states, progress accounting, snapshots, events, errors
//! - `artifact` - completed artifact records and lookup references
//! - `ports` - `TransferEngine`, event emitter and session service traits
//! - `config` - session manager configuration
//! - `paths` - download-root confinement for relative paths
#![deny(unused_crate_dependencies)]

pub mod artifact;
pub mod config;
pub mod paths;
pub mod ports;
pub mod session;

// Re-export commonly used types for convenience
pub use artifact::{ArtifactRef, CompletedArtifact};
pub use config::SessionConfig;
pub use paths::{PathError, confine, is_partial_file_name, partial_path};
pub use ports::{
    EngineError, NoopSessionEmitter, ReadOutcome, ResolvedFile, SessionEventEmitterPort,
    SessionServicePort, StartRequest, TransferEngine, TransferHandle, TransferStream,
};
pub use session::{
    Progress, ProgressError, ProgressReport, SessionError, SessionEvent, SessionId,
    SessionResult, SessionSnapshot, SessionState,
};
