use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::{assert_pending, task};

use xfer_core::{
    ArtifactRef, SessionConfig, SessionError, SessionEvent, SessionId, SessionServicePort,
    SessionState, StartRequest,
};

use super::{SessionManager, SessionManagerDeps, build_session_manager};
use crate::testing::{RecordingEmitter, Script, ScriptedEngine};

struct Harness {
    dir: TempDir,
    engine: ScriptedEngine,
    emitter: RecordingEmitter,
    manager: SessionManager,
}

impl Harness {
    fn new(engine: ScriptedEngine) -> Self {
        Self::with_config(engine, |config| config)
    }

    fn with_config(engine: ScriptedEngine, tweak: impl FnOnce(SessionConfig) -> SessionConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let emitter = RecordingEmitter::new();
        let manager = build_session_manager(SessionManagerDeps {
            engine: Arc::new(engine.clone()),
            event_emitter: Arc::new(emitter.clone()),
            config: tweak(SessionConfig::new(dir.path())),
        });
        Self {
            dir,
            engine,
            emitter,
            manager,
        }
    }

    async fn start(&self, id: &str, locator: &str) -> SessionId {
        self.manager
            .start_session(StartRequest::new(locator).with_id(SessionId::parse(id).unwrap()))
            .await
            .unwrap()
    }

    /// Poll until `id` has written at least `bytes`.
    async fn wait_for_bytes(&self, id: &SessionId, bytes: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let written = self
                    .manager
                    .get_progress(id)
                    .await
                    .map_or(0, |report| report.downloaded_bytes);
                if written >= bytes {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session did not reach the expected byte count");
    }

    fn files_on_disk(&self) -> Vec<String> {
        let mut names = walk(self.dir.path());
        names.sort();
        names
    }
}

fn walk(dir: &Path) -> Vec<String> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_dir() {
            out.extend(walk(&entry.path()));
        } else {
            out.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    out
}

fn two_file_engine() -> ScriptedEngine {
    ScriptedEngine::new().with("res", Script::files([("a.bin", 1000), ("b.bin", 2000)]))
}

#[tokio::test]
async fn progress_is_reported_mid_transfer_and_artifact_recorded() {
    let h = Harness::new(two_file_engine());
    h.engine.release(1500);
    let id = h.start("s1", "res").await;

    h.wait_for_bytes(&id, 1500).await;
    let report = h.manager.get_progress(&id).await.unwrap();
    assert_eq!(report.state, SessionState::Active);
    assert_eq!(report.downloaded_bytes, 1500);
    assert_eq!(report.total_size_bytes, 3000);
    assert_eq!(report.progress, 50);
    assert!(h.manager.list_completed().await.is_empty());

    h.engine.release_all();
    let snap = h.manager.wait_until_terminal(&id).await.unwrap();
    assert_eq!(snap.state, SessionState::Completed);
    assert_eq!(snap.percentage(), 100);

    let expected = h.dir.path().join("b.bin");
    let completed = h.manager.list_completed().await;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].session_id, id);
    assert_eq!(completed[0].file_path, expected);
    assert_eq!(
        h.manager
            .resolve_artifact(&ArtifactRef::Session(id.clone()))
            .await
            .unwrap(),
        expected
    );
    assert_eq!(h.files_on_disk(), vec!["a.bin", "b.bin"]);
    assert_eq!(h.engine.closed_handles(), 1);
}

#[tokio::test]
async fn cancel_mid_transfer_removes_files() {
    let h = Harness::new(two_file_engine());
    h.engine.release(500);
    let id = h.start("s1", "res").await;
    h.wait_for_bytes(&id, 500).await;

    h.manager.cancel_session(&id).await.unwrap();
    let second = h.manager.cancel_session(&id).await.unwrap_err();
    assert!(second.is_not_found());

    let snap = h.manager.wait_until_terminal(&id).await.unwrap();
    assert_eq!(snap.state, SessionState::Cancelled);
    assert_eq!(snap.progress.downloaded(), 500);
    assert!(h.files_on_disk().is_empty());
    assert!(h.manager.list_completed().await.is_empty());
    assert_eq!(h.engine.closed_handles(), 1);

    let events = h.emitter.events();
    assert!(matches!(events.first(), Some(SessionEvent::SessionStarted { .. })));
    assert!(matches!(events.last(), Some(SessionEvent::SessionCancelled { .. })));
}

#[tokio::test]
async fn cancel_does_not_touch_earlier_artifacts() {
    let engine = two_file_engine().with("other", Script::files([("c.bin", 300)]));
    let h = Harness::new(engine);
    h.engine.release(300);
    let done = h.start("done", "other").await;
    h.manager.wait_until_terminal(&done).await.unwrap();

    let id = h.start("s2", "res").await;
    h.engine.release(200);
    h.wait_for_bytes(&id, 200).await;
    h.manager.cancel_session(&id).await.unwrap();
    h.manager.wait_until_terminal(&id).await.unwrap();

    let completed = h.manager.list_completed().await;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].session_id, done);
    assert_eq!(h.files_on_disk(), vec!["c.bin"]);
}

#[tokio::test]
async fn cancel_keeps_same_named_artifact_of_another_session() {
    let engine = ScriptedEngine::new()
        .with("single", Script::files([("a.bin", 300)]))
        .with("pair", Script::files([("a.bin", 300), ("b.bin", 2000)]));
    let h = Harness::new(engine);
    h.engine.release(300);
    let done = h.start("done", "single").await;
    h.manager.wait_until_terminal(&done).await.unwrap();

    let other = h.start("other", "pair").await;
    h.engine.release(400);
    h.wait_for_bytes(&other, 400).await;
    h.manager.cancel_session(&other).await.unwrap();
    let snap = h.manager.wait_until_terminal(&other).await.unwrap();
    assert_eq!(snap.state, SessionState::Cancelled);

    let completed = h.manager.list_completed().await;
    assert_eq!(completed.len(), 1);
    let path = h
        .manager
        .resolve_artifact(&ArtifactRef::Session(done))
        .await
        .unwrap();
    assert_eq!(path, h.dir.path().join("a.bin"));
    assert_eq!(h.files_on_disk(), vec!["a.bin"]);
}

#[tokio::test]
async fn restart_with_same_id_resets_progress() {
    let h = Harness::new(two_file_engine());
    h.engine.release(500);
    let id = h.start("job", "res").await;
    h.wait_for_bytes(&id, 500).await;

    let again = h.start("job", "res").await;
    assert_eq!(again, id);
    let report = h.manager.get_progress(&id).await.unwrap();
    assert_eq!(report.downloaded_bytes, 0);
    assert!(!report.state.is_terminal());

    h.engine.release_all();
    let snap = h.manager.wait_until_terminal(&id).await.unwrap();
    assert_eq!(snap.state, SessionState::Completed);
    assert_eq!(snap.progress.downloaded(), 3000);
    assert_eq!(h.manager.list_completed().await.len(), 1);
    assert_eq!(h.engine.opened_handles(), 2);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let h = Harness::new(ScriptedEngine::new());
    let id = SessionId::parse("ghost").unwrap();

    assert!(h.manager.get_progress(&id).await.unwrap_err().is_not_found());
    assert!(h.manager.cancel_session(&id).await.unwrap_err().is_not_found());
    assert!(h.manager.wait_until_terminal(&id).await.unwrap_err().is_not_found());
    assert_eq!(
        h.manager
            .resolve_artifact(&ArtifactRef::Session(id))
            .await
            .unwrap_err(),
        SessionError::artifact_not_found("ghost")
    );
}

#[tokio::test]
async fn blank_locator_is_rejected_without_registration() {
    let h = Harness::new(ScriptedEngine::new());

    for locator in ["", "   "] {
        let err = h
            .manager
            .start_session(StartRequest::new(locator))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Rejected { .. }));
    }
    assert_eq!(h.manager.active_count(), 0);
}

#[tokio::test]
async fn generated_ids_are_distinct() {
    let engine = ScriptedEngine::new().with("empty", Script::files(Vec::<(String, u64)>::new()));
    let h = Harness::new(engine);

    let a = h.manager.start_session(StartRequest::new("empty")).await.unwrap();
    let b = h.manager.start_session(StartRequest::new("empty")).await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn empty_resource_completes_at_full_percentage() {
    let engine = ScriptedEngine::new().with("empty", Script::files(Vec::<(String, u64)>::new()));
    let h = Harness::new(engine);
    let id = h.start("z", "empty").await;

    let snap = h.manager.wait_until_terminal(&id).await.unwrap();
    assert_eq!(snap.state, SessionState::Completed);
    let report = h.manager.get_progress(&id).await.unwrap();
    assert_eq!(report.progress, 100);
    assert_eq!(report.total_size_bytes, 0);
    assert!(h.manager.list_completed().await.is_empty());
}

#[tokio::test]
async fn resolution_failure_is_reported() {
    let engine = ScriptedEngine::new().with("broken", Script::unresolvable("no peers"));
    let h = Harness::new(engine);
    let id = h.start("f", "broken").await;

    let snap = h.manager.wait_until_terminal(&id).await.unwrap();
    assert_eq!(snap.state, SessionState::Failed);
    assert!(matches!(snap.error, Some(SessionError::ResolutionFailed { .. })));

    let report = h.manager.get_progress(&id).await.unwrap();
    assert!(report.error.unwrap().contains("no peers"));
    assert!(h.manager.cancel_session(&id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn unknown_locator_fails_resolution() {
    let h = Harness::new(ScriptedEngine::new());
    let id = h.start("u", "nowhere").await;

    let snap = h.manager.wait_until_terminal(&id).await.unwrap();
    assert_eq!(snap.state, SessionState::Failed);
    assert_eq!(h.engine.opened_handles(), 0);
}

#[tokio::test]
async fn wait_until_terminal_blocks_while_active() {
    let h = Harness::new(two_file_engine());
    let id = h.start("w", "res").await;

    let mut waiting = task::spawn(h.manager.wait_until_terminal(&id));
    assert_pending!(waiting.poll());
    drop(waiting);

    h.engine.release_all();
    let snap = h.manager.wait_until_terminal(&id).await.unwrap();
    assert_eq!(snap.state, SessionState::Completed);
}

#[tokio::test]
async fn zero_retention_forgets_finished_sessions() {
    let engine = ScriptedEngine::new().with("small", Script::files([("s.bin", 10)]));
    let h = Harness::with_config(engine, |config| config.with_finished_retention(0));
    h.engine.release_all();
    let id = h.start("gone", "small").await;

    assert!(h.manager.wait_until_terminal(&id).await.unwrap_err().is_not_found());
    assert_eq!(h.manager.list_completed().await.len(), 1);
}

#[tokio::test]
async fn shutdown_cancels_workers_and_rejects_new_sessions() {
    let h = Harness::new(two_file_engine());
    let a = h.start("a", "res").await;
    let b = h.start("b", "res").await;
    tokio::task::yield_now().await;

    h.manager.shutdown().await;

    assert_eq!(h.manager.active_count(), 0);
    for id in [&a, &b] {
        let snap = h.manager.get_session(id).await.unwrap();
        assert_eq!(snap.state, SessionState::Cancelled);
    }
    let err = h.manager.start_session(StartRequest::new("res")).await.unwrap_err();
    assert!(matches!(err, SessionError::Rejected { .. }));
    assert!(h.files_on_disk().is_empty());
}

#[tokio::test]
async fn start_racing_shutdown_is_refused_and_shutdown_finishes() {
    let h = Harness::new(two_file_engine());
    let early = h.start("early", "res").await;

    // The shutdown sweep lands before the next registration.
    h.manager.registry().close();
    let late = SessionId::parse("late").unwrap();
    let err = h
        .manager
        .start_session(StartRequest::new("res").with_id(late.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Rejected { .. }));
    assert!(h.manager.get_progress(&late).await.unwrap_err().is_not_found());

    tokio::time::timeout(Duration::from_secs(5), h.manager.shutdown())
        .await
        .expect("shutdown waited on a session it never cancelled");
    let snap = h.manager.get_session(&early).await.unwrap();
    assert_eq!(snap.state, SessionState::Cancelled);
}

#[tokio::test]
async fn resolve_artifact_by_path_stays_under_root() {
    let h = Harness::new(ScriptedEngine::new());
    let movies = h.dir.path().join("movies");
    std::fs::create_dir_all(&movies).unwrap();
    std::fs::write(movies.join("x.mkv"), b"data").unwrap();
    std::fs::write(movies.join(".x.mkv.7.part"), b"da").unwrap();

    let found = h
        .manager
        .resolve_artifact(&ArtifactRef::Path("movies/x.mkv".into()))
        .await
        .unwrap();
    assert_eq!(found, movies.join("x.mkv"));

    let escape = h
        .manager
        .resolve_artifact(&ArtifactRef::Path("../etc/passwd".into()))
        .await
        .unwrap_err();
    assert!(matches!(escape, SessionError::Rejected { .. }));

    for missing in ["movies/y.mkv", "movies/.x.mkv.7.part", "movies"] {
        let err = h
            .manager
            .resolve_artifact(&ArtifactRef::Path(missing.into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ArtifactNotFound { .. }), "{missing}");
    }
}

#[tokio::test]
async fn artifact_deleted_from_disk_is_not_found() {
    let engine = ScriptedEngine::new().with("small", Script::files([("s.bin", 10)]));
    let h = Harness::new(engine);
    h.engine.release_all();
    let id = h.start("d", "small").await;
    let snap = h.manager.wait_until_terminal(&id).await.unwrap();

    std::fs::remove_file(snap.file_path.unwrap()).unwrap();
    let err = h
        .manager
        .resolve_artifact(&ArtifactRef::Session(id))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ArtifactNotFound { .. }));
}
