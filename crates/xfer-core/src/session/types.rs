//! Core identifiers and the session state machine.
//!
//! Pure data types with no I/O dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::SessionError;

/// Maximum accepted length of a caller-supplied session id.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque identifier for a transfer session.
///
/// Supplied by the caller or generated at session creation. It is the only
/// key used for lookups across the registry, the cancellation table and the
/// completed-artifact index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Parse a caller-supplied id.
    ///
    /// Rejects empty ids, ids longer than [`MAX_SESSION_ID_LEN`] and ids
    /// containing whitespace or control characters.
    pub fn parse(raw: impl Into<String>) -> Result<Self, SessionError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SessionError::rejected("session id must not be empty"));
        }
        if raw.len() > MAX_SESSION_ID_LEN {
            return Err(SessionError::rejected(format!(
                "session id longer than {MAX_SESSION_ID_LEN} bytes"
            )));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(SessionError::rejected(
                "session id must not contain whitespace or control characters",
            ));
        }
        Ok(Self(raw))
    }

    /// Generate a fresh random id (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Lifecycle state of a session.
///
/// Transitions are one-directional: `Idle -> Active -> {Completed | Cancelled | Failed}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Registered, worker not yet running.
    #[default]
    Idle,
    /// A worker is driving the transfer.
    Active,
    /// All files transferred.
    Completed,
    /// Stopped by a cancellation signal.
    Cancelled,
    /// Stopped by a resolution or I/O failure.
    Failed,
}

impl SessionState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Idle => matches!(next, Self::Active),
            Self::Active => next.is_terminal(),
            Self::Completed | Self::Cancelled | Self::Failed => false,
        }
    }

    /// String representation used in logs and responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
