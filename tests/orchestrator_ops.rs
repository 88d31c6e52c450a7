// tests/orchestrator_ops.rs

//! Orchestrator state machine: the five operations, cache discipline, and
//! result reconciliation against scripted worker backends.

use std::path::PathBuf;

use regex::Regex;
use testmux::errors::RunnerError;
use testmux::identity::TestIdentity;
use testmux::orchestrator::{Orchestrator, RunOutcome, WorkerKind};
use testmux::protocol::{decode_request, ExecuteRequest, FilePatterns, RunResult};
use testmux_test_utils::fake_backend::FakeWorkerBackend;
use testmux_test_utils::init_tracing;

fn identity(suite: &str, name: &str, file: &str) -> TestIdentity {
    TestIdentity::new(&[suite.to_string()], name, file)
}

fn orchestrator(backend: FakeWorkerBackend) -> Orchestrator<FakeWorkerBackend> {
    Orchestrator::new(
        "/ws",
        serde_json::json!({}),
        FilePatterns::default(),
        backend,
    )
}

fn decode_execution(payload: &str) -> ExecuteRequest {
    decode_request(payload).expect("execution payload should decode")
}

/// The grep as the execution worker will apply it.
fn worker_matcher(grep: &str) -> Regex {
    Regex::new(&format!("^({grep})$")).unwrap()
}

#[tokio::test]
async fn run_all_discovers_then_executes_with_deduped_files() {
    init_tracing();

    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[
        identity("math", "add", "/ws/test/math.js"),
        identity("math", "subtract", "/ws/test/math.js"),
        identity("io", "read", "/ws/test/io.js"),
    ]);
    backend.push_execution_result(&RunResult::default());
    let invocations = backend.invocations.clone();

    let mut orchestrator = orchestrator(backend);
    let outcome = orchestrator.run_all().await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed(RunResult::default()));

    let invocations = invocations.lock().unwrap().clone();
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[0].0, WorkerKind::Discovery);
    assert_eq!(invocations[1].0, WorkerKind::Execution);

    let request = decode_execution(&invocations[1].1);
    // Two tests share math.js; the file list is deduped, order preserved.
    assert_eq!(
        request.files,
        vec![PathBuf::from("/ws/test/math.js"), PathBuf::from("/ws/test/io.js")]
    );
    assert_eq!(request.grep, None);
}

#[tokio::test]
async fn run_all_reuses_the_cached_test_set() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[identity("s", "t", "/ws/test/s.js")]);
    backend.push_execution_result(&RunResult::default());
    backend.push_execution_result(&RunResult::default());
    let invocations = backend.invocations.clone();

    let mut orchestrator = orchestrator(backend);
    orchestrator.run_all().await.unwrap();
    orchestrator.run_all().await.unwrap();

    let kinds: Vec<WorkerKind> = invocations.lock().unwrap().iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![WorkerKind::Discovery, WorkerKind::Execution, WorkerKind::Execution]
    );
}

#[tokio::test]
async fn empty_discovery_reports_no_tests_without_executing() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[]);
    let invocations = backend.invocations.clone();

    let mut orchestrator = orchestrator(backend);
    let outcome = orchestrator.run_all().await.unwrap();

    assert_eq!(outcome, RunOutcome::NoTestsFound);
    assert_eq!(invocations.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn run_selected_targets_one_file_with_an_exact_grep() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_execution_result(&RunResult::default());
    let invocations = backend.invocations.clone();

    let test = identity("math", "add", "/ws/test/math.js");
    let mut orchestrator = orchestrator(backend);
    orchestrator.run_selected(&test).await.unwrap();

    let invocations = invocations.lock().unwrap().clone();
    assert_eq!(invocations.len(), 1);
    let request = decode_execution(&invocations[0].1);

    assert_eq!(request.files, vec![PathBuf::from("/ws/test/math.js")]);
    let matcher = worker_matcher(request.grep.as_deref().unwrap());
    assert!(matcher.is_match("math add"));
    assert!(!matcher.is_match("math add items"));
}

#[tokio::test]
async fn run_by_pattern_passes_the_pattern_verbatim() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[identity("math", "add", "/ws/test/math.js")]);
    backend.push_execution_result(&RunResult::default());
    let invocations = backend.invocations.clone();

    let mut orchestrator = orchestrator(backend);
    orchestrator.run_by_pattern("math .*").await.unwrap();

    let invocations = invocations.lock().unwrap().clone();
    let request = decode_execution(&invocations[1].1);
    assert_eq!(request.grep.as_deref(), Some("math .*"));
}

#[tokio::test]
async fn run_failed_with_no_previous_run_is_an_informational_noop() {
    let backend = FakeWorkerBackend::new();
    let invocations = backend.invocations.clone();

    let mut orchestrator = orchestrator(backend);
    let outcome = orchestrator.run_failed().await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingToRerun);
    assert!(invocations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_failed_after_a_clean_run_spawns_nothing_and_keeps_state() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[identity("s", "t", "/ws/test/s.js")]);
    backend.push_execution_result(&RunResult::default());
    let invocations = backend.invocations.clone();

    let mut orchestrator = orchestrator(backend);
    orchestrator.run_all().await.unwrap();
    let before = invocations.lock().unwrap().len();

    let outcome = orchestrator.run_failed().await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingToRerun);
    assert_eq!(invocations.lock().unwrap().len(), before);
    assert!(orchestrator.last_result().unwrap().failed.is_empty());
}

#[tokio::test]
async fn run_failed_combines_files_and_exact_patterns_across_files() {
    init_tracing();

    // Literal scenario: a.js has "x pass" and "x fail", b.js has "y fail".
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[
        identity("x", "pass", "/ws/test/a.js"),
        identity("x", "fail", "/ws/test/a.js"),
        identity("y", "fail", "/ws/test/b.js"),
    ]);
    backend.push_execution_result(&RunResult {
        failed: vec![
            identity("x", "fail", "/ws/test/a.js"),
            identity("y", "fail", "/ws/test/b.js"),
        ],
    });
    backend.push_execution_result(&RunResult::default());
    let invocations = backend.invocations.clone();

    let mut orchestrator = orchestrator(backend);
    orchestrator.run_all().await.unwrap();
    orchestrator.run_failed().await.unwrap();

    let invocations = invocations.lock().unwrap().clone();
    let request = decode_execution(&invocations[2].1);

    // Both files re-run together in one execution.
    assert_eq!(
        request.files,
        vec![PathBuf::from("/ws/test/a.js"), PathBuf::from("/ws/test/b.js")]
    );

    // The combined grep selects exactly the failing tests.
    let matcher = worker_matcher(request.grep.as_deref().unwrap());
    assert!(matcher.is_match("x fail"));
    assert!(matcher.is_match("y fail"));
    assert!(!matcher.is_match("x pass"));
}

#[tokio::test]
async fn run_last_set_replays_the_recorded_operation() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[identity("math", "add", "/ws/test/math.js")]);
    backend.push_execution_result(&RunResult::default());
    backend.push_execution_result(&RunResult::default());
    let invocations = backend.invocations.clone();

    let mut orchestrator = orchestrator(backend);
    orchestrator.run_by_pattern("add.*").await.unwrap();
    orchestrator.run_last_set().await.unwrap();

    let invocations = invocations.lock().unwrap().clone();
    let first = decode_execution(&invocations[1].1);
    let second = decode_execution(&invocations[2].1);
    assert_eq!(first.grep, second.grep);
    assert_eq!(first.files, second.files);
}

#[tokio::test]
async fn run_last_set_with_no_history_is_an_informational_noop() {
    let backend = FakeWorkerBackend::new();

    let mut orchestrator = orchestrator(backend);
    let outcome = orchestrator.run_last_set().await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingToRerun);
}

#[tokio::test]
async fn discovery_failure_surfaces_worker_report_and_keeps_cache() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_failure("Cannot find module 'helper'", Some("at require (...)"));

    let mut orchestrator = orchestrator(backend);
    let err = orchestrator.discover().await.unwrap_err();

    match err {
        RunnerError::DiscoveryFailed { message, stack } => {
            assert!(message.contains("Cannot find module"));
            assert!(stack.is_some());
        }
        other => panic!("expected DiscoveryFailed, got {other:?}"),
    }

    assert!(orchestrator.tests().is_none());
}

#[tokio::test]
async fn truncated_discovery_payload_with_clean_exit_is_malformed_output() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_raw(WorkerKind::Discovery, 0, br#"[{"name": "partial"#);

    let mut orchestrator = orchestrator(backend);
    let err = orchestrator.discover().await.unwrap_err();

    assert!(matches!(err, RunnerError::MalformedWorkerOutput { .. }));
    assert!(orchestrator.tests().is_none());
}

#[tokio::test]
async fn empty_discovery_payload_with_clean_exit_is_malformed_output() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_raw(WorkerKind::Discovery, 0, b"");

    let mut orchestrator = orchestrator(backend);
    let err = orchestrator.discover().await.unwrap_err();

    assert!(matches!(err, RunnerError::MalformedWorkerOutput { .. }));
}

#[tokio::test]
async fn execution_crash_leaves_the_previous_result_in_place() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[identity("s", "t", "/ws/test/s.js")]);
    let good = RunResult {
        failed: vec![identity("s", "t", "/ws/test/s.js")],
    };
    backend.push_execution_result(&good);
    backend.push_raw(WorkerKind::Execution, -1, b"worker blew up before reporting");

    let mut orchestrator = orchestrator(backend);
    orchestrator.run_all().await.unwrap();

    let err = orchestrator.run_all().await.unwrap_err();
    assert!(matches!(err, RunnerError::MalformedWorkerOutput { .. }));

    // The failed run must not clobber the last good result.
    assert_eq!(orchestrator.last_result().unwrap().failed.len(), 1);
}

#[tokio::test]
async fn nonzero_exit_with_valid_result_is_a_completed_run() {
    let mut backend = FakeWorkerBackend::new();
    backend.push_discovery_tests(&[identity("s", "t", "/ws/test/s.js")]);
    let failing = RunResult {
        failed: vec![identity("s", "t", "/ws/test/s.js")],
    };
    // Exit code 1 = one failing test, by framework convention.
    backend.push_raw(
        WorkerKind::Execution,
        1,
        &serde_json::to_vec(&failing).unwrap(),
    );

    let mut orchestrator = orchestrator(backend);
    let outcome = orchestrator.run_all().await.unwrap();

    match outcome {
        RunOutcome::Completed(result) => assert_eq!(result.failed.len(), 1),
        other => panic!("expected Completed, got {other:?}"),
    }
}
