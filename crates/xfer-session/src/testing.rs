//! Deterministic engine and emitter for tests.
//!
//! [`ScriptedEngine`] serves resources registered under a locator. Bytes
//! flow only while the shared byte budget allows: tests release the budget
//! step by step to freeze a transfer at an exact byte count, or open it
//! fully with [`ScriptedEngine::release_all`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use xfer_core::{
    EngineError, ReadOutcome, ResolvedFile, SessionEvent, SessionEventEmitterPort, TransferEngine,
    TransferHandle, TransferStream,
};

/// Size of each chunk a scripted stream hands out.
pub const SCRIPT_CHUNK: u64 = 100;

/// One scripted resource.
#[derive(Debug, Clone, Default)]
pub struct Script {
    files: Vec<ResolvedFile>,
    resolve_error: Option<String>,
    fail_after: Option<u64>,
    extra_bytes: u64,
    empty_reads: bool,
}

impl Script {
    /// Resource made of `files` (`(path, size)` pairs).
    pub fn files<P: Into<String>>(files: impl IntoIterator<Item = (P, u64)>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(path, size)| ResolvedFile::new(path, size))
                .collect(),
            ..Self::default()
        }
    }

    /// Resource whose resolution fails with `message`.
    pub fn unresolvable(message: impl Into<String>) -> Self {
        Self {
            resolve_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Fail the stream once this many bytes of the resource went out.
    #[must_use]
    pub const fn fail_after(mut self, bytes: u64) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    /// Deliver `bytes` more than each file's declared size.
    #[must_use]
    pub const fn over_deliver(mut self, bytes: u64) -> Self {
        self.extra_bytes = bytes;
        self
    }

    /// Interleave an empty read before every chunk.
    #[must_use]
    pub const fn with_empty_reads(mut self) -> Self {
        self.empty_reads = true;
        self
    }
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    aborted: AtomicUsize,
    consumed: AtomicU64,
}

/// Engine that plays back [`Script`]s under a shared byte budget.
#[derive(Clone)]
pub struct ScriptedEngine {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    budget: watch::Sender<u64>,
    counters: Arc<Counters>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    /// Engine with no resources and a zero budget.
    #[must_use]
    pub fn new() -> Self {
        let (budget, _) = watch::channel(0);
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            budget,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Register `script` under `locator`.
    #[must_use]
    pub fn with(self, locator: impl Into<String>, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator.into(), script);
        self
    }

    /// Allow `bytes` more bytes to flow, across all streams.
    pub fn release(&self, bytes: u64) {
        self.budget.send_modify(|b| *b = b.saturating_add(bytes));
    }

    /// Remove the byte limit.
    pub fn release_all(&self) {
        self.budget.send_replace(u64::MAX);
    }

    /// Bytes handed out so far.
    pub fn consumed(&self) -> u64 {
        self.counters.consumed.load(Ordering::SeqCst)
    }

    /// Handles opened so far.
    pub fn opened_handles(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Handles closed so far.
    pub fn closed_handles(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Streams aborted so far.
    pub fn aborted_streams(&self) -> usize {
        self.counters.aborted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferEngine for ScriptedEngine {
    async fn open(&self, locator: &str) -> Result<Box<dyn TransferHandle>, EngineError> {
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .cloned()
            .ok_or_else(|| EngineError::Unsupported {
                locator: locator.to_string(),
            })?;
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedHandle {
            locator: locator.to_string(),
            script,
            sent: Arc::new(AtomicU64::new(0)),
            budget: self.budget.subscribe(),
            counters: Arc::clone(&self.counters),
            closed: false,
        }))
    }
}

struct ScriptedHandle {
    locator: String,
    script: Script,
    /// Bytes of this resource handed out, across its files.
    sent: Arc<AtomicU64>,
    budget: watch::Receiver<u64>,
    counters: Arc<Counters>,
    closed: bool,
}

#[async_trait]
impl TransferHandle for ScriptedHandle {
    async fn resolve(&mut self) -> Result<Vec<ResolvedFile>, EngineError> {
        if let Some(message) = &self.script.resolve_error {
            return Err(EngineError::resolve(&self.locator, message.clone()));
        }
        Ok(self.script.files.clone())
    }

    async fn open_stream(&mut self, file: &ResolvedFile) -> Result<Box<dyn TransferStream>, EngineError> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        Ok(Box::new(ScriptedStream {
            remaining: file.size + self.script.extra_bytes,
            fail_after: self.script.fail_after,
            empty_reads: self.script.empty_reads,
            owe_empty: self.script.empty_reads,
            sent: Arc::clone(&self.sent),
            budget: self.budget.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct ScriptedStream {
    remaining: u64,
    fail_after: Option<u64>,
    empty_reads: bool,
    owe_empty: bool,
    sent: Arc<AtomicU64>,
    budget: watch::Receiver<u64>,
    counters: Arc<Counters>,
}

#[async_trait]
impl TransferStream for ScriptedStream {
    async fn read(&mut self, max: usize) -> Result<ReadOutcome, EngineError> {
        if self.remaining == 0 {
            return Ok(ReadOutcome::EndOfStream);
        }
        if let Some(limit) = self.fail_after {
            if self.sent.load(Ordering::SeqCst) >= limit {
                return Err(EngineError::io("ConnectionReset", "scripted stream failure"));
            }
        }
        if self.owe_empty {
            self.owe_empty = false;
            return Ok(ReadOutcome::Empty);
        }

        let counters = Arc::clone(&self.counters);
        let granted = self
            .budget
            .wait_for(|budget| *budget > counters.consumed.load(Ordering::SeqCst))
            .await
            .map_err(|_| EngineError::Closed)?;
        let available = *granted - self.counters.consumed.load(Ordering::SeqCst);
        drop(granted);

        let mut n = self.remaining.min(SCRIPT_CHUNK).min(available).min(max as u64);
        if let Some(limit) = self.fail_after {
            n = n.min(limit.saturating_sub(self.sent.load(Ordering::SeqCst)).max(1));
        }

        self.remaining -= n;
        self.sent.fetch_add(n, Ordering::SeqCst);
        self.counters.consumed.fetch_add(n, Ordering::SeqCst);
        self.owe_empty = self.empty_reads;
        let len = usize::try_from(n).map_err(|e| EngineError::io("InvalidInput", e.to_string()))?;
        Ok(ReadOutcome::Data(Bytes::from(vec![0xAB; len])))
    }

    async fn abort(&mut self) {
        self.remaining = 0;
        self.counters.aborted.fetch_add(1, Ordering::SeqCst);
    }
}

/// Emitter that keeps every event for later inspection.
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl RecordingEmitter {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted so far.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionEventEmitterPort for RecordingEmitter {
    fn emit(&self, event: SessionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn clone_box(&self) -> Box<dyn SessionEventEmitterPort> {
        Box::new(self.clone())
    }
}
