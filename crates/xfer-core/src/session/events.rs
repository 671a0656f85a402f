//! Session lifecycle events.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::types::SessionId;

/// Discriminated union of everything a session worker announces.
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"session_progress","id":"...","downloaded":1500,"total":3000,"percentage":50}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A worker picked the session up.
    SessionStarted {
        /// Session identifier.
        id: SessionId,
        /// Locator being transferred.
        locator: String,
    },

    /// The engine resolved the file set.
    SessionResolved {
        /// Session identifier.
        id: SessionId,
        /// Number of constituent files.
        files: usize,
        /// Sum of all file sizes.
        total: u64,
    },

    /// Bytes were transferred.
    SessionProgress {
        /// Session identifier.
        id: SessionId,
        /// Bytes transferred so far.
        downloaded: u64,
        /// Expected total.
        total: u64,
        /// Whole-number percentage.
        percentage: u8,
    },

    /// Every file was transferred.
    SessionCompleted {
        /// Session identifier.
        id: SessionId,
        /// Recorded artifact path, if the resource had any file.
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<PathBuf>,
    },

    /// The session stopped on its cancellation signal.
    SessionCancelled {
        /// Session identifier.
        id: SessionId,
    },

    /// The session stopped on an error.
    SessionFailed {
        /// Session identifier.
        id: SessionId,
        /// Error message.
        error: String,
    },
}

impl SessionEvent {
    /// Session this event belongs to.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        match self {
            Self::SessionStarted { id, .. }
            | Self::SessionResolved { id, .. }
            | Self::SessionProgress { id, .. }
            | Self::SessionCompleted { id, .. }
            | Self::SessionCancelled { id }
            | Self::SessionFailed { id, .. } => id,
        }
    }

    /// Whether this event ends the session.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionCompleted { .. } | Self::SessionCancelled { .. } | Self::SessionFailed { .. }
        )
    }
}
