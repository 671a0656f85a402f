//! Session service port: the operations exposed to clients.
//!
//! Adapters (HTTP, CLI) depend on this trait only.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::artifact::{ArtifactRef, CompletedArtifact};
use crate::session::{ProgressReport, SessionId, SessionResult, SessionSnapshot};

/// Request to start a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    /// Caller-chosen id. A fresh one is generated when absent.
    pub id: Option<SessionId>,
    /// What to transfer.
    pub locator: String,
}

impl StartRequest {
    /// Request for `locator` with a generated id.
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            id: None,
            locator: locator.into(),
        }
    }

    /// Use a caller-chosen id. Restarts any session already using it.
    #[must_use]
    pub fn with_id(mut self, id: SessionId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Public interface of the session subsystem.
#[async_trait]
pub trait SessionServicePort: Send + Sync {
    /// Register a session and spawn its worker.
    ///
    /// Returns the id the session runs under. Fails with `Rejected` for an
    /// unusable request; nothing is registered in that case.
    async fn start_session(&self, request: StartRequest) -> SessionResult<SessionId>;

    /// Progress of an active or recently finished session.
    async fn get_progress(&self, id: &SessionId) -> SessionResult<ProgressReport>;

    /// Full snapshot of an active or recently finished session.
    async fn get_session(&self, id: &SessionId) -> SessionResult<SessionSnapshot>;

    /// Signal cancellation. `NotFound` when no worker is active for `id`.
    async fn cancel_session(&self, id: &SessionId) -> SessionResult<()>;

    /// All completed artifacts, oldest first.
    async fn list_completed(&self) -> Vec<CompletedArtifact>;

    /// Local path of a completed artifact or of a file under the download root.
    async fn resolve_artifact(&self, reference: &ArtifactRef) -> SessionResult<PathBuf>;
}
