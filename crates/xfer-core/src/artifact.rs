//! Completed artifact records.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Final file of a session that reached `Completed`.
///
/// Immutable once recorded and independent of the session's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedArtifact {
    /// Originating session.
    pub session_id: SessionId,
    /// Absolute path of the last file written by the session.
    pub file_path: PathBuf,
    /// When the session completed.
    pub completed_at: DateTime<Utc>,
}

impl CompletedArtifact {
    /// Record stamped with the current time.
    #[must_use]
    pub fn new(session_id: SessionId, file_path: PathBuf) -> Self {
        Self {
            session_id,
            file_path,
            completed_at: Utc::now(),
        }
    }
}

/// How a caller names an artifact to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactRef {
    /// By the session that produced it.
    Session(SessionId),
    /// By path relative to the download root.
    Path(String),
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session {id}"),
            Self::Path(path) => write!(f, "path {path}"),
        }
    }
}

impl From<SessionId> for ArtifactRef {
    fn from(id: SessionId) -> Self {
        Self::Session(id)
    }
}
