//! Session worker pipeline.
//!
//! One worker drives one session from `Active` to a terminal state. It owns
//! the engine handle and the file sinks; shared state is only touched
//! through lease-checked registry calls, never across an `.await`.
//!
//! # Pipeline
//!
//! 1. **Resolve**: open a handle for the locator and list its files
//! 2. **Transfer**: per file, stream chunks into a hidden partial file and
//!    rename it into place on end-of-stream
//! 3. **Terminal**: close the handle, commit the terminal state, clean up
//!
//! Cancellation is checked before every read and before every write, and
//! every engine call is raced against the cancellation signal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use xfer_core::{
    EngineError, ReadOutcome, ResolvedFile, SessionConfig, SessionError, SessionEvent,
    SessionEventEmitterPort, SessionId, SessionSnapshot, SessionState, TransferEngine,
    TransferHandle, TransferStream, confine, partial_path,
};

use crate::artifacts::ArtifactIndex;
use crate::progress::ProgressThrottle;
use crate::registry::{SessionLease, SessionRegistry, TerminalOutcome};

/// Dependencies shared by every worker.
#[derive(Clone)]
pub struct WorkerDeps {
    /// Session state.
    pub registry: Arc<SessionRegistry>,
    /// Where completed sessions are recorded.
    pub artifacts: Arc<ArtifactIndex>,
    /// Byte source.
    pub engine: Arc<dyn TransferEngine>,
    /// Event sink.
    pub emitter: Arc<dyn SessionEventEmitterPort>,
    /// Download root, chunk size, event spacing.
    pub config: SessionConfig,
}

/// One session to drive.
#[derive(Debug, Clone)]
pub struct SessionJob {
    /// Registration this worker owns.
    pub lease: SessionLease,
    /// What to transfer.
    pub locator: String,
}

/// Files on disk that belong to this run.
#[derive(Debug, Default)]
struct Scratch {
    /// Partial file currently being written.
    partial: Option<PathBuf>,
    /// Files this run created by renaming into place. A final path that
    /// already existed before the rename is never listed here.
    finalized: Vec<PathBuf>,
}

/// Run a session to its terminal state.
///
/// Returns the terminal snapshot, or `None` when the session was
/// superseded (or removed) before the worker could commit its outcome.
pub async fn run_session(job: SessionJob, deps: WorkerDeps) -> Option<SessionSnapshot> {
    let SessionJob { lease, locator } = job;
    let id = lease.id().clone();

    if let Err(e) = deps.registry.activate(&lease) {
        tracing::debug!(target: "xfer.session", id = %id, error = %e, "Session gone before worker start");
        return None;
    }
    tracing::info!(target: "xfer.session", id = %id, locator = %locator, "Session started");
    deps.emitter.emit(SessionEvent::SessionStarted {
        id: id.clone(),
        locator: locator.clone(),
    });

    let mut handle: Option<Box<dyn TransferHandle>> = None;
    let mut scratch = Scratch::default();
    let result = transfer(&lease, &locator, &deps, &mut handle, &mut scratch).await;

    if let Some(mut handle) = handle.take() {
        handle.close().await;
    }

    finalize(&lease, result, &deps, scratch).await
}

fn resolution_error(e: EngineError) -> SessionError {
    SessionError::resolution_failed(e.to_string())
}

fn io_error(e: &std::io::Error) -> SessionError {
    SessionError::from_io_error(e)
}

/// Map every resolved file to its destination and sum the sizes.
fn plan_files(root: &Path, files: &[ResolvedFile]) -> Result<(Vec<PathBuf>, u64), SessionError> {
    let mut total = 0u64;
    let mut paths: Vec<PathBuf> = Vec::with_capacity(files.len());
    for file in files {
        let path = confine(root, &file.path)
            .map_err(|e| SessionError::resolution_failed(format!("{}: {e}", file.path)))?;
        if paths.contains(&path) {
            return Err(SessionError::resolution_failed(format!(
                "{} listed twice",
                file.path
            )));
        }
        total = total
            .checked_add(file.size)
            .ok_or_else(|| SessionError::resolution_failed("total size overflows u64"))?;
        paths.push(path);
    }
    Ok((paths, total))
}

async fn transfer(
    lease: &SessionLease,
    locator: &str,
    deps: &WorkerDeps,
    slot: &mut Option<Box<dyn TransferHandle>>,
    scratch: &mut Scratch,
) -> Result<Option<PathBuf>, SessionError> {
    let cancel = lease.cancel_token();

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SessionError::Cancelled),
        r = deps.engine.open(locator) => r,
    };
    let handle = slot.insert(opened.map_err(resolution_error)?);

    let files = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SessionError::Cancelled),
        r = handle.resolve() => r.map_err(resolution_error)?,
    };
    let (paths, total) = plan_files(&deps.config.download_root, &files)?;

    deps.registry.set_total(lease, total)?;
    tracing::debug!(target: "xfer.session", id = %lease.id(), files = files.len(), total, "Resolved");
    deps.emitter.emit(SessionEvent::SessionResolved {
        id: lease.id().clone(),
        files: files.len(),
        total,
    });
    if files.is_empty() {
        tracing::warn!(target: "xfer.session", id = %lease.id(), "Resource has no files; nothing to record");
    }

    let mut throttle = ProgressThrottle::new(deps.config.progress_interval);
    let mut last = None;
    for (file, final_path) in files.iter().zip(paths) {
        transfer_file(lease, &mut **handle, file, &final_path, deps, scratch, &mut throttle).await?;
        last = Some(final_path);
    }
    Ok(last)
}

async fn transfer_file(
    lease: &SessionLease,
    handle: &mut dyn TransferHandle,
    file: &ResolvedFile,
    final_path: &Path,
    deps: &WorkerDeps,
    scratch: &mut Scratch,
    throttle: &mut ProgressThrottle,
) -> Result<(), SessionError> {
    let cancel = lease.cancel_token();
    if cancel.is_cancelled() {
        return Err(SessionError::Cancelled);
    }

    if let Some(parent) = final_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(&e))?;
    }
    deps.registry.set_file_path(lease, final_path.to_path_buf())?;

    let mut stream = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SessionError::Cancelled),
        r = handle.open_stream(file) => r?,
    };

    let partial = partial_path(final_path, lease.lease().get());
    scratch.partial = Some(partial.clone());
    throttle.reset();
    let copied = copy_stream(lease, &mut *stream, file, &partial, deps, throttle).await;
    if copied.is_err() {
        stream.abort().await;
    }
    drop(stream);
    copied?;

    // Unknown counts as existing: cleanup must never delete what it cannot
    // prove this run created.
    let replaced = tokio::fs::try_exists(final_path).await.unwrap_or(true);
    tokio::fs::rename(&partial, final_path)
        .await
        .map_err(|e| io_error(&e))?;
    scratch.partial = None;
    if replaced {
        tracing::debug!(target: "xfer.session", id = %lease.id(), path = %final_path.display(), "Replaced existing file");
    } else {
        scratch.finalized.push(final_path.to_path_buf());
    }
    tracing::debug!(target: "xfer.session", id = %lease.id(), path = %final_path.display(), "File finished");
    Ok(())
}

async fn copy_stream(
    lease: &SessionLease,
    stream: &mut dyn TransferStream,
    file: &ResolvedFile,
    partial: &Path,
    deps: &WorkerDeps,
    throttle: &mut ProgressThrottle,
) -> Result<(), SessionError> {
    let cancel = lease.cancel_token();
    let mut sink = tokio::fs::File::create(partial)
        .await
        .map_err(|e| io_error(&e))?;
    let mut received = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            r = stream.read(deps.config.chunk_size) => r?,
        };

        match outcome {
            ReadOutcome::Data(bytes) => {
                let n = bytes.len() as u64;
                received += n;
                if received > file.size {
                    return Err(SessionError::io(
                        "InvalidData",
                        format!("{} delivered more than its {} bytes", file.path, file.size),
                    ));
                }
                if cancel.is_cancelled() {
                    return Err(SessionError::Cancelled);
                }
                sink.write_all(&bytes).await.map_err(|e| io_error(&e))?;
                let progress = deps.registry.advance(lease, n)?;
                if throttle.should_emit() {
                    deps.emitter.emit(SessionEvent::SessionProgress {
                        id: lease.id().clone(),
                        downloaded: progress.downloaded(),
                        total: progress.total(),
                        percentage: progress.percentage(),
                    });
                }
            }
            ReadOutcome::Empty => tokio::task::yield_now().await,
            ReadOutcome::EndOfStream => break,
        }
    }

    if received < file.size {
        return Err(SessionError::io(
            "UnexpectedEof",
            format!("{} ended after {received} of {} bytes", file.path, file.size),
        ));
    }
    sink.flush().await.map_err(|e| io_error(&e))?;
    Ok(())
}

async fn remove_quietly(path: &Path, id: &SessionId) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(target: "xfer.session", id = %id, path = %path.display(), "Removed file");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(target: "xfer.session", id = %id, path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

/// Delete the files this run finalized, except any another session has
/// since recorded as its artifact.
async fn remove_finalized(scratch: &Scratch, deps: &WorkerDeps, id: &SessionId) {
    for path in &scratch.finalized {
        if deps.artifacts.held_by_other(path, id) {
            tracing::debug!(target: "xfer.session", id = %id, path = %path.display(), "Keeping file recorded by another session");
            continue;
        }
        remove_quietly(path, id).await;
    }
}

async fn finalize(
    lease: &SessionLease,
    result: Result<Option<PathBuf>, SessionError>,
    deps: &WorkerDeps,
    scratch: Scratch,
) -> Option<SessionSnapshot> {
    let id = lease.id();
    let outcome = match result {
        Ok(file_path) => TerminalOutcome::Completed { file_path },
        Err(SessionError::Cancelled | SessionError::Superseded) => TerminalOutcome::Cancelled,
        Err(e) => TerminalOutcome::Failed(e),
    };

    let artifacts = &deps.artifacts;
    let finished = deps.registry.finish(lease, outcome, |snapshot| {
        if let Some(path) = &snapshot.file_path {
            artifacts.record(snapshot.id.clone(), path.clone());
        }
    });

    // The partial name is unique to this lease, so it is always ours.
    if let Some(partial) = &scratch.partial {
        remove_quietly(partial, id).await;
    }

    let Some(snapshot) = finished else {
        tracing::info!(target: "xfer.session", id = %id, lease = lease.lease().get(), "Superseded worker exiting");
        return None;
    };

    match snapshot.state {
        SessionState::Completed => {
            tracing::info!(
                target: "xfer.session",
                id = %id,
                bytes = snapshot.progress.downloaded(),
                "Session completed"
            );
            deps.emitter.emit(SessionEvent::SessionCompleted {
                id: id.clone(),
                file_path: snapshot.file_path.clone(),
            });
        }
        SessionState::Cancelled => {
            remove_finalized(&scratch, deps, id).await;
            tracing::info!(target: "xfer.session", id = %id, "Session cancelled");
            deps.emitter.emit(SessionEvent::SessionCancelled { id: id.clone() });
        }
        SessionState::Failed => {
            remove_finalized(&scratch, deps, id).await;
            let error = snapshot
                .error
                .as_ref()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string);
            tracing::warn!(target: "xfer.session", id = %id, error = %error, "Session failed");
            deps.emitter.emit(SessionEvent::SessionFailed {
                id: id.clone(),
                error,
            });
        }
        SessionState::Idle | SessionState::Active => {}
    }
    Some(snapshot)
}
