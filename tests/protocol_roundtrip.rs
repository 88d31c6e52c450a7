// tests/protocol_roundtrip.rs

//! Full protocol loop without a process boundary: the orchestrator's
//! payloads run through the real worker entry points against a scripted
//! engine, so argv JSON, channel bytes, and exit codes are all exercised
//! together.

use std::path::Path;

use tempfile::TempDir;
use testmux::orchestrator::{Orchestrator, RunOutcome, WorkerKind};
use testmux::protocol::FilePatterns;
use testmux_test_utils::builders::{root, suite};
use testmux_test_utils::fake_backend::EngineBackend;
use testmux_test_utils::fake_engine::ScriptedEngine;
use testmux_test_utils::{init_tracing, with_timeout};

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "// test file\n").unwrap();
}

/// Workspace with `a.js` ("x pass", "x fail") and `b.js` ("y fail").
fn two_file_workspace() -> (TempDir, ScriptedEngine) {
    let ws = TempDir::new().unwrap();
    let a = ws.path().join("test/a.js");
    let b = ws.path().join("test/b.js");
    touch(&a);
    touch(&b);

    let tree = root()
        .suite(suite("x").test("pass", &a).test("fail", &a))
        .suite(suite("y").test("fail", &b))
        .build();
    let engine = ScriptedEngine::new(tree).fail("x fail").fail("y fail");

    (ws, engine)
}

fn orchestrator_over(
    ws: &TempDir,
    engine: ScriptedEngine,
) -> Orchestrator<EngineBackend> {
    Orchestrator::new(
        ws.path(),
        serde_json::json!({}),
        FilePatterns::default(),
        EngineBackend::new(engine),
    )
}

#[tokio::test]
async fn discovery_and_execution_round_trip_through_the_wire_format() {
    init_tracing();

    let (ws, engine) = two_file_workspace();
    let mut orchestrator = orchestrator_over(&ws, engine);

    let tests = with_timeout(orchestrator.discover()).await.unwrap().to_vec();
    let full_names: Vec<&str> = tests.iter().map(|t| t.full_name.as_str()).collect();
    assert_eq!(full_names, vec!["x pass", "x fail", "y fail"]);

    let outcome = with_timeout(orchestrator.run_all()).await.unwrap();
    match outcome {
        RunOutcome::Completed(result) => {
            let failed: Vec<&str> = result.failed.iter().map(|t| t.full_name.as_str()).collect();
            assert_eq!(failed, vec!["x fail", "y fail"]);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn run_failed_reruns_only_failing_tests_across_both_files() {
    init_tracing();

    let (ws, engine) = two_file_workspace();
    let ran = engine.ran.clone();
    let mut orchestrator = orchestrator_over(&ws, engine);

    orchestrator.run_all().await.unwrap();
    let after_run_all = ran.lock().unwrap().len();
    assert_eq!(after_run_all, 3);

    let outcome = orchestrator.run_failed().await.unwrap();
    match outcome {
        RunOutcome::Completed(result) => assert_eq!(result.failed.len(), 2),
        other => panic!("expected Completed, got {other:?}"),
    }

    // The re-run touched both files but executed only the failing tests:
    // "x pass" lives in the same file as "x fail" and must not run again.
    let ran = ran.lock().unwrap().clone();
    assert_eq!(ran[after_run_all..], ["x fail", "y fail"]);
}

#[tokio::test]
async fn selected_test_runs_alone_even_with_a_prefix_sibling() {
    let ws = TempDir::new().unwrap();
    let file = ws.path().join("test/calc.js");
    touch(&file);

    let tree = root().suite(
        suite("calc")
            .test("add", &file)
            .test("add items", &file),
    );
    let engine = ScriptedEngine::new(tree.build());
    let ran = engine.ran.clone();
    let mut orchestrator = orchestrator_over(&ws, engine);

    let tests = orchestrator.discover().await.unwrap().to_vec();
    let add = tests.iter().find(|t| t.full_name == "calc add").unwrap().clone();

    orchestrator.run_selected(&add).await.unwrap();

    assert_eq!(*ran.lock().unwrap(), vec!["calc add"]);
}

#[tokio::test]
async fn worker_log_channel_reaches_the_backend_line_by_line() {
    let (ws, engine) = two_file_workspace();
    let backend = EngineBackend::new(engine);
    let log_lines = backend.log_lines.clone();
    let mut orchestrator = Orchestrator::new(
        ws.path(),
        serde_json::json!({}),
        FilePatterns::default(),
        backend,
    );

    orchestrator.run_all().await.unwrap();

    let lines = log_lines.lock().unwrap().clone();
    assert!(lines.iter().any(|l| l.contains("Test file(s):")));
    assert!(lines.iter().any(|l| l.contains("x fail")));
}

#[tokio::test]
async fn load_error_in_the_engine_becomes_discovery_failed() {
    let ws = TempDir::new().unwrap();
    touch(&ws.path().join("test/broken.js"));

    let engine = ScriptedEngine::new(root().build()).with_load_error("SyntaxError: oops");
    let mut orchestrator = orchestrator_over(&ws, engine);

    let err = orchestrator.run_all().await.unwrap_err();
    assert!(err.to_string().contains("test discovery failed"));
    assert!(orchestrator.tests().is_none());
}

#[tokio::test]
async fn discovery_payload_sent_to_the_worker_carries_the_configured_scope() {
    let (ws, engine) = two_file_workspace();
    let backend = EngineBackend::new(engine);
    let invocations = backend.invocations.clone();
    let mut orchestrator = Orchestrator::new(
        ws.path(),
        serde_json::json!({"ui": "bdd"}),
        FilePatterns {
            glob: "test/**/*.js".to_string(),
            ignore: "**/.git/**".to_string(),
        },
        backend,
    );

    orchestrator.discover().await.unwrap();

    let invocations = invocations.lock().unwrap().clone();
    assert_eq!(invocations[0].0, WorkerKind::Discovery);
    let payload: serde_json::Value = serde_json::from_str(&invocations[0].1).unwrap();
    assert_eq!(payload["files"]["glob"], "test/**/*.js");
    assert_eq!(payload["options"]["ui"], "bdd");
    assert_eq!(payload["rootPath"], ws.path().to_string_lossy().as_ref());
}
