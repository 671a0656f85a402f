//! Copies of session state handed out to callers.
//!
//! Everything here is owned data taken while the registry lock is held, so
//! callers never observe a half-applied update.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::SessionError;
use super::progress::Progress;
use super::types::{SessionId, SessionState};

/// Point-in-time copy of one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Lifecycle state at the time of the copy.
    pub state: SessionState,
    /// Byte counters.
    pub progress: Progress,
    /// Final path of the file currently (or last) being transferred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Why the session failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    /// Snapshot of a session that was just created.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            progress: Progress::new(),
            file_path: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Reported percentage.
    ///
    /// A completed session reports 100 even when nothing had to be
    /// transferred.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.state == SessionState::Completed {
            100
        } else {
            self.progress.percentage()
        }
    }

    /// Build the caller-facing progress report.
    #[must_use]
    pub fn report(&self) -> ProgressReport {
        ProgressReport::from(self)
    }
}

/// Answer to a progress query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Session identifier.
    pub session_id: SessionId,
    /// Lifecycle state.
    pub state: SessionState,
    /// Whole-number percentage, `0..=100`.
    pub progress: u8,
    /// Bytes transferred so far.
    pub downloaded_bytes: u64,
    /// Expected total (`0` until resolved).
    pub total_size_bytes: u64,
    /// Path of the file being written, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Failure message for `failed` sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SessionSnapshot> for ProgressReport {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.id.clone(),
            state: snapshot.state,
            progress: snapshot.percentage(),
            downloaded_bytes: snapshot.progress.downloaded(),
            total_size_bytes: snapshot.progress.total(),
            file_path: snapshot.file_path.clone(),
            error: snapshot.error.as_ref().map(ToString::to_string),
        }
    }
}
