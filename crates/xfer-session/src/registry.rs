//! The session registry.
//!
//! One mutex guards every piece of shared session state: the active table
//! (snapshot, cancellation token, lease, state channel per session) and the
//! bounded table of finished snapshots. Every method takes the lock once,
//! does its work without awaiting, and releases it.
//!
//! # Leases
//!
//! `create` mints a fresh [`LeaseId`] for every session it registers. The
//! worker presents its [`SessionLease`] on every mutation; a lease that no
//! longer matches the active entry (the session was superseded) is refused
//! with [`SessionError::Superseded`], so an orphaned worker can never touch
//! its successor's state.
//!
//! # Lock order
//!
//! registry → artifact index. `finish` runs its completion hook with the
//! registry lock held; nothing ever takes the registry lock while holding
//! the artifact index lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use xfer_core::{Progress, SessionError, SessionId, SessionResult, SessionSnapshot, SessionState};

/// Identifies one registration of a session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseId(u64);

impl LeaseId {
    /// Raw lease number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// What `create` hands to the worker that will drive the session.
#[derive(Debug, Clone)]
pub struct SessionLease {
    id: SessionId,
    lease: LeaseId,
    cancel: CancellationToken,
}

impl SessionLease {
    /// Session this lease belongs to.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Lease number.
    #[must_use]
    pub const fn lease(&self) -> LeaseId {
        self.lease
    }

    /// Cancellation signal of this registration.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// Every file transferred. `file_path` is the last file written, if any.
    Completed {
        /// Artifact path to record.
        file_path: Option<PathBuf>,
    },
    /// The cancellation signal was observed.
    Cancelled,
    /// Resolution or I/O failure.
    Failed(SessionError),
}

struct ActiveSession {
    lease: LeaseId,
    cancel: CancellationToken,
    snapshot: SessionSnapshot,
    state_tx: watch::Sender<SessionState>,
}

#[derive(Default)]
struct RegistryInner {
    active: HashMap<SessionId, ActiveSession>,
    finished: IndexMap<SessionId, SessionSnapshot>,
    /// Set by `close`; `create` refuses from then on.
    closed: bool,
}

/// Authoritative map from session id to session state.
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
    lease_counter: AtomicU64,
    retention: usize,
}

impl SessionRegistry {
    /// Create a registry keeping at most `retention` finished snapshots.
    #[must_use]
    pub fn new(retention: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            lease_counter: AtomicU64::new(1),
            retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // No critical section can leave the tables half-updated, so a
        // poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `id` as a fresh `Idle` session.
    ///
    /// An existing active entry for `id` is cancelled and discarded, and any
    /// finished snapshot for it is dropped, so the next read sees zero bytes.
    /// Refused with `Rejected` once the registry is closed.
    pub fn create(&self, id: SessionId) -> SessionResult<SessionLease> {
        let lease = LeaseId(self.lease_counter.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let (state_tx, _) = watch::channel(SessionState::Idle);

        let mut inner = self.lock();
        if inner.closed {
            return Err(SessionError::rejected("service is shutting down"));
        }
        if let Some(prior) = inner.active.remove(&id) {
            prior.cancel.cancel();
            tracing::info!(target: "xfer.session", id = %id, lease = prior.lease.get(), "Superseded active session");
        }
        inner.finished.shift_remove(&id);
        inner.active.insert(
            id.clone(),
            ActiveSession {
                lease,
                cancel: cancel.clone(),
                snapshot: SessionSnapshot::new(id.clone()),
                state_tx,
            },
        );
        drop(inner);

        Ok(SessionLease { id, lease, cancel })
    }

    /// Snapshot of an active session, or of a retained finished one.
    pub fn get(&self, id: &SessionId) -> SessionResult<SessionSnapshot> {
        let inner = self.lock();
        inner
            .active
            .get(id)
            .map(|entry| entry.snapshot.clone())
            .or_else(|| inner.finished.get(id).cloned())
            .ok_or_else(|| SessionError::not_found(id.as_str()))
    }

    /// Forget `id` entirely, cancelling its worker if one is active.
    pub fn remove(&self, id: &SessionId) -> Option<SessionSnapshot> {
        let mut inner = self.lock();
        let active = inner.active.remove(id).map(|entry| {
            entry.cancel.cancel();
            entry.snapshot
        });
        let finished = inner.finished.shift_remove(id);
        active.or(finished)
    }

    /// Deliver the cancellation signal to the active worker for `id`.
    ///
    /// Never blocks. `NotFound` when nothing is active under `id`;
    /// `AlreadyCancelled` when the signal was already delivered.
    pub fn signal(&self, id: &SessionId) -> SessionResult<()> {
        let inner = self.lock();
        let entry = inner
            .active
            .get(id)
            .ok_or_else(|| SessionError::not_found(id.as_str()))?;
        if entry.cancel.is_cancelled() {
            return Err(SessionError::already_cancelled(id.as_str()));
        }
        entry.cancel.cancel();
        Ok(())
    }

    /// Refuse new sessions and cancel every active one.
    ///
    /// Both happen under one lock, so no session can be registered after
    /// the sweep without being refused. Returns how many were signalled.
    pub fn close(&self) -> usize {
        let mut inner = self.lock();
        inner.closed = true;
        inner
            .active
            .values()
            .filter(|entry| !entry.cancel.is_cancelled())
            .inspect(|entry| entry.cancel.cancel())
            .count()
    }

    /// Ids of all active sessions, sorted.
    pub fn active_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.lock().active.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of active sessions.
    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    /// Subscribe to state changes of the active session `id`.
    pub fn subscribe(&self, id: &SessionId) -> Option<watch::Receiver<SessionState>> {
        self.lock().active.get(id).map(|entry| entry.state_tx.subscribe())
    }

    /// Whether `lease` still owns its session id.
    pub fn is_current(&self, lease: &SessionLease) -> bool {
        self.lock()
            .active
            .get(&lease.id)
            .is_some_and(|entry| entry.lease == lease.lease)
    }

    /// Run `f` on the entry owned by `lease`.
    fn with_entry<T>(
        &self,
        lease: &SessionLease,
        f: impl FnOnce(&mut ActiveSession) -> SessionResult<T>,
    ) -> SessionResult<T> {
        let mut inner = self.lock();
        match inner.active.get_mut(&lease.id) {
            Some(entry) if entry.lease == lease.lease => f(entry),
            _ => Err(SessionError::Superseded),
        }
    }

    /// `Idle -> Active`.
    pub fn activate(&self, lease: &SessionLease) -> SessionResult<()> {
        self.with_entry(lease, |entry| {
            transition(entry, SessionState::Active)?;
            Ok(())
        })
    }

    /// Record the resolved total. Allowed once per session.
    pub fn set_total(&self, lease: &SessionLease, total: u64) -> SessionResult<()> {
        self.with_entry(lease, |entry| {
            entry
                .snapshot
                .progress
                .set_total(total)
                .map_err(|e| SessionError::other(e.to_string()))
        })
    }

    /// Add `n` written bytes and return the updated counters.
    ///
    /// Fails with an I/O error if that would exceed the resolved total.
    pub fn advance(&self, lease: &SessionLease, n: u64) -> SessionResult<Progress> {
        self.with_entry(lease, |entry| {
            if entry.snapshot.state.is_terminal() {
                return Err(SessionError::other("session already finished"));
            }
            entry
                .snapshot
                .progress
                .advance(n)
                .map_err(|e| SessionError::io("InvalidData", e.to_string()))?;
            Ok(entry.snapshot.progress)
        })
    }

    /// Record the path of the file now being written.
    pub fn set_file_path(&self, lease: &SessionLease, path: PathBuf) -> SessionResult<()> {
        self.with_entry(lease, |entry| {
            entry.snapshot.file_path = Some(path);
            Ok(())
        })
    }

    /// Move the session owned by `lease` to its terminal state.
    ///
    /// A `Completed` outcome becomes `Cancelled` if the signal was delivered
    /// first; `on_completed` runs, under the registry lock, only when the
    /// session really completes. Returns `None` when `lease` was superseded.
    pub fn finish(
        &self,
        lease: &SessionLease,
        outcome: TerminalOutcome,
        on_completed: impl FnOnce(&SessionSnapshot),
    ) -> Option<SessionSnapshot> {
        let mut inner = self.lock();
        if !inner
            .active
            .get(&lease.id)
            .is_some_and(|entry| entry.lease == lease.lease)
        {
            return None;
        }
        let mut entry = inner.active.remove(&lease.id)?;

        let outcome = match outcome {
            TerminalOutcome::Completed { .. } if entry.cancel.is_cancelled() => TerminalOutcome::Cancelled,
            other => other,
        };
        let state = match outcome {
            TerminalOutcome::Completed { file_path } => {
                if file_path.is_some() {
                    entry.snapshot.file_path = file_path;
                }
                SessionState::Completed
            }
            TerminalOutcome::Cancelled => SessionState::Cancelled,
            TerminalOutcome::Failed(error) => {
                entry.snapshot.error = Some(error);
                SessionState::Failed
            }
        };

        // An Idle session that never ran still ends; step through Active.
        if entry.snapshot.state == SessionState::Idle {
            entry.snapshot.state = SessionState::Active;
        }
        if let Err(e) = transition(&mut entry, state) {
            tracing::error!(target: "xfer.session", id = %lease.id, error = %e, "Illegal terminal transition");
        }
        entry.snapshot.finished_at = Some(Utc::now());

        if state == SessionState::Completed {
            on_completed(&entry.snapshot);
        }

        let snapshot = entry.snapshot.clone();
        if self.retention > 0 {
            inner.finished.insert(lease.id.clone(), entry.snapshot);
            while inner.finished.len() > self.retention {
                inner.finished.shift_remove_index(0);
            }
        }
        Some(snapshot)
    }
}

fn transition(entry: &mut ActiveSession, next: SessionState) -> SessionResult<()> {
    let current = entry.snapshot.state;
    if !current.can_transition_to(next) {
        return Err(SessionError::other(format!(
            "illegal transition {current} -> {next}"
        )));
    }
    entry.snapshot.state = next;
    entry.state_tx.send_replace(next);
    Ok(())
}
