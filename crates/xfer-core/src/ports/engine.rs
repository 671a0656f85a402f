//! Transfer engine port.
//!
//! An engine turns a locator into a set of files and a byte stream per file.
//! The session worker drives it through three levels of handle:
//!
//! 1. [`TransferEngine::open`] yields a [`TransferHandle`] for one locator
//! 2. [`TransferHandle::resolve`] lists the constituent files
//! 3. [`TransferHandle::open_stream`] yields a [`TransferStream`] per file
//!
//! The worker always calls [`TransferHandle::close`] before it finishes,
//! whatever the outcome.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionError;

/// Error reported by an engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// No engine understands this locator.
    #[error("unsupported locator: {locator}")]
    Unsupported {
        /// The locator as given.
        locator: String,
    },

    /// The locator could not be turned into a file set.
    #[error("failed to resolve {locator}: {message}")]
    Resolve {
        /// The locator as given.
        locator: String,
        /// Underlying cause.
        message: String,
    },

    /// Reading from the remote side failed.
    #[error("stream error ({kind}): {message}")]
    Io {
        /// Error kind.
        kind: String,
        /// Underlying cause.
        message: String,
    },

    /// The handle was already closed.
    #[error("transfer handle is closed")]
    Closed,
}

impl EngineError {
    /// Create a resolution error.
    pub fn resolve(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Create a stream error.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create a stream error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::io(format!("{kind:?}"), err.to_string())
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unsupported { .. } | EngineError::Resolve { .. } => {
                Self::resolution_failed(err.to_string())
            }
            EngineError::Io { kind, message } => Self::Io { kind, message },
            EngineError::Closed => Self::engine(err.to_string()),
        }
    }
}

/// One constituent file of a resolved resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFile {
    /// Path relative to the download root.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

impl ResolvedFile {
    /// Create a resolved file.
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Result of a single read.
///
/// An empty read is not the end of the stream; only `EndOfStream` is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes were read.
    Data(Bytes),
    /// Nothing available yet.
    Empty,
    /// The file is complete.
    EndOfStream,
}

/// Factory of per-locator transfer handles.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Open a handle for `locator`.
    ///
    /// Failures here are resolution failures.
    async fn open(&self, locator: &str) -> Result<Box<dyn TransferHandle>, EngineError>;
}

/// A live transfer of one locator.
#[async_trait]
pub trait TransferHandle: Send {
    /// List the constituent files and their sizes, in transfer order.
    async fn resolve(&mut self) -> Result<Vec<ResolvedFile>, EngineError>;

    /// Open the byte stream of one resolved file.
    async fn open_stream(&mut self, file: &ResolvedFile) -> Result<Box<dyn TransferStream>, EngineError>;

    /// Release everything this handle holds. Must be idempotent.
    async fn close(&mut self);
}

/// Byte stream of one file.
#[async_trait]
pub trait TransferStream: Send {
    /// Read at most `max` bytes.
    async fn read(&mut self, max: usize) -> Result<ReadOutcome, EngineError>;

    /// Stop the stream early, releasing its resources.
    async fn abort(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_session_errors() {
        let err: SessionError = EngineError::resolve("x://y", "nope").into();
        assert!(matches!(err, SessionError::ResolutionFailed { .. }));

        let err: SessionError = EngineError::io("ConnectionReset", "reset").into();
        assert_eq!(err, SessionError::io("ConnectionReset", "reset"));

        let err: SessionError = EngineError::Unsupported {
            locator: "magnet:?".into(),
        }
        .into();
        assert!(matches!(err, SessionError::ResolutionFailed { .. }));

        let err: SessionError = EngineError::Closed.into();
        assert!(matches!(err, SessionError::Engine { .. }));
    }
}
