//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the session core expects from infrastructure.
//! They use only domain types.
//!
//! # Design Rules
//!
//! - No `reqwest`, `tokio` or filesystem types in any signature
//! - Engines are opened per session and closed on every exit path
//! - Event emission never blocks

pub mod engine;
pub mod event_emitter;
pub mod session_service;

pub use engine::{EngineError, ReadOutcome, ResolvedFile, TransferEngine, TransferHandle, TransferStream};
pub use event_emitter::{NoopSessionEmitter, SessionEventEmitterPort};
pub use session_service::{SessionServicePort, StartRequest};
