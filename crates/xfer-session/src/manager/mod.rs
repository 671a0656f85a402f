//! Session manager: the service boundary.
//!
//! The manager registers sessions, spawns one worker per session on a
//! [`TaskTracker`] and answers queries from the registry and the artifact
//! index. It never waits on a worker except in [`SessionManager::shutdown`]
//! and [`SessionManager::wait_until_terminal`].
//!
//! # Concurrency Model
//!
//! - One registry lock guards every session entry; no `.await` while held
//! - Lease ids prevent a superseded worker from committing anything
//! - Lock order: registry → artifact index (only inside `finish`)

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::task::TaskTracker;

use xfer_core::{
    ArtifactRef, CompletedArtifact, PathError, ProgressReport, SessionConfig, SessionError,
    SessionEventEmitterPort, SessionId, SessionResult, SessionServicePort, SessionSnapshot,
    StartRequest, TransferEngine, confine, is_partial_file_name,
};

use crate::artifacts::ArtifactIndex;
use crate::registry::SessionRegistry;
use crate::worker::{SessionJob, WorkerDeps, run_session};

/// Dependencies for building a session manager.
pub struct SessionManagerDeps<T, E>
where
    T: TransferEngine + 'static,
    E: SessionEventEmitterPort + 'static,
{
    /// Engine that resolves locators and streams bytes.
    pub engine: Arc<T>,
    /// Port for emitting session events.
    pub event_emitter: Arc<E>,
    /// Download root and limits.
    pub config: SessionConfig,
}

/// Build a session manager from its dependencies.
///
/// The result can be stored as `Arc<dyn SessionServicePort>` in adapters.
pub fn build_session_manager<T, E>(deps: SessionManagerDeps<T, E>) -> SessionManager
where
    T: TransferEngine + 'static,
    E: SessionEventEmitterPort + 'static,
{
    SessionManager::new(deps.engine, deps.event_emitter, deps.config)
}

/// Concrete implementation of [`SessionServicePort`].
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    artifacts: Arc<ArtifactIndex>,
    engine: Arc<dyn TransferEngine>,
    emitter: Arc<dyn SessionEventEmitterPort>,
    config: SessionConfig,
    tracker: TaskTracker,
}

impl SessionManager {
    /// Create a manager with empty registry and artifact index.
    pub fn new(
        engine: Arc<dyn TransferEngine>,
        emitter: Arc<dyn SessionEventEmitterPort>,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(config.finished_retention)),
            artifacts: Arc::new(ArtifactIndex::new()),
            engine,
            emitter,
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// Session table.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Completed-artifact index.
    pub fn artifacts(&self) -> &Arc<ArtifactIndex> {
        &self.artifacts
    }

    /// Configuration this manager was built with.
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of sessions with a live worker registration.
    pub fn active_count(&self) -> usize {
        self.registry.active_count()
    }

    fn worker_deps(&self) -> WorkerDeps {
        WorkerDeps {
            registry: Arc::clone(&self.registry),
            artifacts: Arc::clone(&self.artifacts),
            engine: Arc::clone(&self.engine),
            emitter: Arc::clone(&self.emitter),
            config: self.config.clone(),
        }
    }

    /// Wait until `id` is no longer active and return its final snapshot.
    ///
    /// Returns immediately if `id` is already finished. `NotFound` if the
    /// id is unknown or its snapshot was evicted.
    pub async fn wait_until_terminal(&self, id: &SessionId) -> SessionResult<SessionSnapshot> {
        if let Some(mut state) = self.registry.subscribe(id) {
            // A closed channel means the entry left the table: finished,
            // superseded or removed. The registry read below settles which.
            let _ = state.wait_for(|s| s.is_terminal()).await;
        }
        self.registry.get(id)
    }

    /// Cancel every session and wait for all workers to exit.
    ///
    /// New sessions are rejected once shutdown has begun. Closing the
    /// registry refuses new registrations and cancels the live ones under
    /// one lock, so a start racing with shutdown is either refused or
    /// cancelled here.
    pub async fn shutdown(&self) {
        let signalled = self.registry.close();
        self.tracker.close();
        tracing::info!(
            target: "xfer.session",
            signalled,
            workers = self.tracker.len(),
            "Shutting down session manager"
        );
        self.tracker.wait().await;
        tracing::info!(target: "xfer.session", "All session workers exited");
    }

    fn resolve_relative(&self, relative: &str) -> SessionResult<PathBuf> {
        let path = confine(&self.config.download_root, relative).map_err(|e| match e {
            PathError::Empty => SessionError::artifact_not_found(relative),
            PathError::NotRelative(_) | PathError::Escapes(_) => {
                SessionError::rejected(e.to_string())
            }
        })?;
        let hidden = path
            .file_name()
            .is_some_and(|name| is_partial_file_name(&name.to_string_lossy()));
        if hidden || !path.is_file() {
            return Err(SessionError::artifact_not_found(relative));
        }
        Ok(path)
    }
}

#[async_trait]
impl SessionServicePort for SessionManager {
    async fn start_session(&self, request: StartRequest) -> SessionResult<SessionId> {
        let locator = request.locator.trim();
        if locator.is_empty() {
            return Err(SessionError::rejected("locator is empty"));
        }
        let id = request.id.unwrap_or_else(SessionId::generate);
        let lease = self.registry.create(id.clone())?;
        tracing::debug!(
            target: "xfer.session",
            id = %id,
            lease = lease.lease().get(),
            "Session registered"
        );

        let job = SessionJob {
            lease,
            locator: locator.to_string(),
        };
        self.tracker.spawn(run_session(job, self.worker_deps()));
        Ok(id)
    }

    async fn get_progress(&self, id: &SessionId) -> SessionResult<ProgressReport> {
        self.registry.get(id).map(|snapshot| snapshot.report())
    }

    async fn get_session(&self, id: &SessionId) -> SessionResult<SessionSnapshot> {
        self.registry.get(id)
    }

    async fn cancel_session(&self, id: &SessionId) -> SessionResult<()> {
        match self.registry.signal(id) {
            Ok(()) => {
                tracing::info!(target: "xfer.session", id = %id, "Cancellation requested");
                Ok(())
            }
            // Cancel must be a no-op once the signal is out.
            Err(SessionError::AlreadyCancelled { .. }) => Err(SessionError::not_found(id.as_str())),
            Err(e) => Err(e),
        }
    }

    async fn list_completed(&self) -> Vec<CompletedArtifact> {
        self.artifacts.list()
    }

    async fn resolve_artifact(&self, reference: &ArtifactRef) -> SessionResult<PathBuf> {
        match reference {
            ArtifactRef::Session(id) => {
                let artifact = self.artifacts.get(id)?;
                if tokio::fs::metadata(&artifact.file_path)
                    .await
                    .is_ok_and(|meta| meta.is_file())
                {
                    Ok(artifact.file_path)
                } else {
                    tracing::warn!(
                        target: "xfer.session",
                        id = %id,
                        path = %artifact.file_path.display(),
                        "Recorded artifact is missing on disk"
                    );
                    Err(SessionError::artifact_not_found(id.as_str()))
                }
            }
            ArtifactRef::Path(relative) => self.resolve_relative(relative),
        }
    }
}

#[cfg(test)]
mod tests;
