// tests/session_state.rs

//! Session snapshot persistence used by one-shot hosts.

use tempfile::TempDir;
use testmux::identity::TestIdentity;
use testmux::orchestrator::{
    load_session, save_session, LastOperation, Orchestrator, RunOutcome, SessionSnapshot,
};
use testmux::protocol::{FilePatterns, RunResult};
use testmux_test_utils::fake_backend::FakeWorkerBackend;

fn identity(suite: &str, name: &str, file: &str) -> TestIdentity {
    TestIdentity::new(&[suite.to_string()], name, file)
}

#[test]
fn snapshot_round_trips_through_disk() {
    let root = TempDir::new().unwrap();

    let snapshot = SessionSnapshot {
        tests: Some(vec![identity("s", "t", "/ws/test/s.js")]),
        last_result: Some(RunResult {
            failed: vec![identity("s", "t", "/ws/test/s.js")],
        }),
        last_operation: Some(LastOperation::RunByPattern("s .*".to_string())),
    };

    save_session(root.path(), &snapshot).unwrap();
    let loaded = load_session(root.path());

    assert_eq!(loaded.tests.unwrap().len(), 1);
    assert_eq!(loaded.last_result.unwrap().failed.len(), 1);
    assert_eq!(
        loaded.last_operation,
        Some(LastOperation::RunByPattern("s .*".to_string()))
    );
}

#[test]
fn missing_session_file_is_an_empty_session() {
    let root = TempDir::new().unwrap();
    let loaded = load_session(root.path());

    assert!(loaded.tests.is_none());
    assert!(loaded.last_result.is_none());
    assert!(loaded.last_operation.is_none());
}

#[test]
fn corrupt_session_file_is_ignored() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join(".testmux");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("session.json"), b"{ not json").unwrap();

    let loaded = load_session(root.path());
    assert!(loaded.tests.is_none());
}

#[tokio::test]
async fn restored_session_drives_run_failed_without_rediscovery() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_execution_result(&RunResult::default());
    let invocations = backend.invocations.clone();

    let mut orchestrator = Orchestrator::new(
        "/ws",
        serde_json::json!({}),
        FilePatterns::default(),
        backend,
    );

    orchestrator.restore(SessionSnapshot {
        tests: Some(vec![identity("x", "fail", "/ws/test/a.js")]),
        last_result: Some(RunResult {
            failed: vec![identity("x", "fail", "/ws/test/a.js")],
        }),
        last_operation: Some(LastOperation::RunFailed),
    });

    let outcome = orchestrator.run_failed().await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(_)));

    // Only the execution worker ran; the restored cache made discovery
    // unnecessary.
    let invocations = invocations.lock().unwrap().clone();
    assert_eq!(invocations.len(), 1);
}

#[tokio::test]
async fn snapshot_reflects_operations_performed() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[identity("s", "t", "/ws/test/s.js")]);
    backend.push_execution_result(&RunResult::default());

    let mut orchestrator = Orchestrator::new(
        "/ws",
        serde_json::json!({}),
        FilePatterns::default(),
        backend,
    );
    orchestrator.run_all().await.unwrap();

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.tests.unwrap().len(), 1);
    assert_eq!(snapshot.last_operation, Some(LastOperation::RunAll));
    assert!(snapshot.last_result.unwrap().failed.is_empty());
}
