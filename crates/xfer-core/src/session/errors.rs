//! Session error types.
//!
//! These errors are serializable and do not hold external error types like
//! `std::io::Error`. For I/O errors, the kind and message are captured as strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for session operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionError {
    /// The engine could not resolve the locator into a file set.
    #[error("Resolution failed: {message}")]
    ResolutionFailed {
        /// Detailed error message.
        message: String,
    },

    /// Local read/write failure, or an engine stream failure.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "`NotFound`", "`PermissionDenied`").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// No session is known under this id.
    #[error("Session not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// No completed artifact matches the reference.
    #[error("Artifact not found: {reference}")]
    ArtifactNotFound {
        /// Session id or path that was looked up.
        reference: String,
    },

    /// Cancellation requested for a session that is no longer active.
    #[error("Session already finished: {id}")]
    AlreadyCancelled {
        /// The session id.
        id: String,
    },

    /// The request was refused before any session was created.
    #[error("Rejected: {reason}")]
    Rejected {
        /// Why the request was refused.
        reason: String,
    },

    /// The session observed its cancellation signal.
    #[error("Session cancelled")]
    Cancelled,

    /// The session was replaced by a newer session with the same id.
    #[error("Session superseded by a newer session")]
    Superseded,

    /// The transfer engine reported a failure that is not plain I/O.
    #[error("Engine error: {message}")]
    Engine {
        /// Message reported by the engine.
        message: String,
    },

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl SessionError {
    /// Create a resolution failure.
    pub fn resolution_failed(message: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            message: message.into(),
        }
    }

    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a not-found error for a session id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a not-found error for an artifact reference.
    pub fn artifact_not_found(reference: impl Into<String>) -> Self {
        Self::ArtifactNotFound {
            reference: reference.into(),
        }
    }

    /// Create an already-cancelled error.
    pub fn already_cancelled(id: impl Into<String>) -> Self {
        Self::AlreadyCancelled { id: id.into() }
    }

    /// Create a rejection.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Create an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this is a cancellation (including supersede).
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Superseded)
    }

    /// Check if this is a lookup miss.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::ArtifactNotFound { .. })
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ResolutionFailed { message } => format!("Could not resolve resource: {message}"),
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::NotFound { id } => format!("No session '{id}'."),
            Self::ArtifactNotFound { reference } => format!("No completed file for '{reference}'."),
            Self::AlreadyCancelled { id } => format!("Session '{id}' is not running."),
            Self::Rejected { reason } => format!("Request rejected: {reason}"),
            Self::Cancelled => "Transfer was cancelled.".to_string(),
            Self::Superseded => "Transfer was replaced by a newer request.".to_string(),
            Self::Engine { message } => format!("Transfer engine error: {message}"),
            Self::Other { message } => message.clone(),
        }
    }
}

/// Convenience result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
