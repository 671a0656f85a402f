//! Completed-artifact index.
//!
//! Append-mostly: workers add an entry when a session completes and the core
//! never removes one. Completing the same session id again replaces its
//! entry and moves it to the end.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;

use xfer_core::{CompletedArtifact, SessionError, SessionId, SessionResult};

/// Final file paths of completed sessions, in completion order.
#[derive(Default)]
pub struct ArtifactIndex {
    entries: Mutex<IndexMap<SessionId, CompletedArtifact>>,
}

impl ArtifactIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the artifact of a completed session.
    pub fn record(&self, id: SessionId, path: PathBuf) -> CompletedArtifact {
        let artifact = CompletedArtifact::new(id.clone(), path);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.shift_remove(&id);
        entries.insert(id, artifact.clone());
        artifact
    }

    /// All artifacts, oldest first.
    pub fn list(&self) -> Vec<CompletedArtifact> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Artifact recorded for `id`.
    pub fn get(&self, id: &SessionId) -> SessionResult<CompletedArtifact> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::artifact_not_found(id.as_str()))
    }

    /// Whether a session other than `id` has `path` as its artifact.
    pub fn held_by_other(&self, path: &Path, id: &SessionId) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|artifact| artifact.file_path == path && &artifact.session_id != id)
    }

    /// Number of recorded artifacts.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has completed yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[test]
    fn record_then_get_and_list() {
        let index = ArtifactIndex::new();
        assert!(index.is_empty());
        index.record(id("a"), PathBuf::from("/d/a.mkv"));
        index.record(id("b"), PathBuf::from("/d/b.mp4"));

        assert_eq!(index.get(&id("a")).unwrap().file_path, PathBuf::from("/d/a.mkv"));
        let listed: Vec<_> = index.list().into_iter().map(|a| a.session_id).collect();
        assert_eq!(listed, vec![id("a"), id("b")]);
    }

    #[test]
    fn unknown_id_is_artifact_not_found() {
        let err = ArtifactIndex::new().get(&id("x")).unwrap_err();
        assert_eq!(err, SessionError::artifact_not_found("x"));
    }

    #[test]
    fn re_recording_replaces_entry() {
        let index = ArtifactIndex::new();
        index.record(id("a"), PathBuf::from("/d/old"));
        index.record(id("b"), PathBuf::from("/d/b"));
        index.record(id("a"), PathBuf::from("/d/new"));

        assert_eq!(index.len(), 2);
        let list = index.list();
        assert_eq!(list[1].session_id, id("a"));
        assert_eq!(list[1].file_path, PathBuf::from("/d/new"));
    }

    #[test]
    fn held_by_other_ignores_own_entry() {
        let index = ArtifactIndex::new();
        index.record(id("a"), PathBuf::from("/d/x.mkv"));

        assert!(index.held_by_other(Path::new("/d/x.mkv"), &id("b")));
        assert!(!index.held_by_other(Path::new("/d/x.mkv"), &id("a")));
        assert!(!index.held_by_other(Path::new("/d/y.mkv"), &id("b")));
    }
}
