// src/orchestrator/mod.rs

//! The long-lived coordinator.
//!
//! One `Orchestrator` per workspace/session owns the two cached
//! collections (discovered test set, last run result) and the record of
//! the last operation. Operations borrow the orchestrator mutably, so two
//! operations can never be in flight on the same instance; overlap is
//! rejected at compile time rather than coordinated at runtime.
//!
//! State discipline: a cache is replaced only after its worker completed
//! and its payload parsed; any failure leaves every cache untouched.

pub mod backend;
pub mod session;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::{Result, RunnerError};
use crate::identity::{self, TestIdentity};
use crate::protocol::{self, DiscoverRequest, ExecuteRequest, FilePatterns, RunResult, WorkerFailure};

pub use backend::{ProcessBackend, WorkerBackend, WorkerKind, WorkerOutput};
pub use session::{load_session, save_session, SessionSnapshot};

/// Outcome of a run operation. The informational variants are not errors:
/// they mutate nothing and map to a non-alarming notice.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The execution worker completed a run; failures may be present.
    Completed(RunResult),
    /// Discovery found nothing to run.
    NoTestsFound,
    /// No failed tests in the last run, or nothing recorded to replay.
    NothingToRerun,
}

/// The last invoked operation, with the parameters needed to replay it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LastOperation {
    RunAll,
    RunSelected(TestIdentity),
    RunByPattern(String),
    RunFailed,
}

pub struct Orchestrator<W: WorkerBackend> {
    backend: W,
    root: PathBuf,
    options: Value,
    patterns: FilePatterns,
    tests: Option<Vec<TestIdentity>>,
    last_result: Option<RunResult>,
    last_operation: Option<LastOperation>,
}

impl<W: WorkerBackend> Orchestrator<W> {
    pub fn new(
        root: impl Into<PathBuf>,
        options: Value,
        patterns: FilePatterns,
        backend: W,
    ) -> Self {
        Self {
            backend,
            root: root.into(),
            options,
            patterns,
            tests: None,
            last_result: None,
            last_operation: None,
        }
    }

    /// The cached discovered test set, if any discovery has completed.
    pub fn tests(&self) -> Option<&[TestIdentity]> {
        self.tests.as_deref()
    }

    /// The result of the last completed execution, if any.
    pub fn last_result(&self) -> Option<&RunResult> {
        self.last_result.as_ref()
    }

    /// Copy the caches into a serializable snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            tests: self.tests.clone(),
            last_result: self.last_result.clone(),
            last_operation: self.last_operation.clone(),
        }
    }

    /// Restore caches from a previously taken snapshot.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        self.tests = snapshot.tests;
        self.last_result = snapshot.last_result;
        self.last_operation = snapshot.last_operation;
    }

    /// Spawn the discovery worker and replace the cached test set.
    pub async fn discover(&mut self) -> Result<&[TestIdentity]> {
        let request = DiscoverRequest {
            root_path: self.root.clone(),
            options: self.options.clone(),
            files: self.patterns.clone(),
        };
        let payload = encode(&request)?;

        let output = self
            .backend
            .run_worker(WorkerKind::Discovery, payload)
            .await?;
        let tests = parse_discovery_output(&output)?;

        info!(count = tests.len(), "discovery completed");
        self.tests = Some(tests);
        Ok(self.tests.as_deref().unwrap_or_default())
    }

    /// Run every discovered test, discovering first if nothing is cached.
    pub async fn run_all(&mut self) -> Result<RunOutcome> {
        self.ensure_discovered().await?;
        self.last_operation = Some(LastOperation::RunAll);

        let tests = self.tests.as_deref().unwrap_or_default();
        if tests.is_empty() {
            return Ok(RunOutcome::NoTestsFound);
        }

        let files = dedupe_files(tests.iter().map(|test| test.file.clone()));
        let result = self.execute(files, None).await?;
        Ok(RunOutcome::Completed(result))
    }

    /// Run exactly one previously discovered test.
    pub async fn run_selected(&mut self, test: &TestIdentity) -> Result<RunOutcome> {
        self.last_operation = Some(LastOperation::RunSelected(test.clone()));

        let grep = identity::exact_grep(&test.full_name);
        let result = self.execute(vec![test.file.clone()], Some(grep)).await?;
        Ok(RunOutcome::Completed(result))
    }

    /// Run every discovered file, restricted by a caller-supplied pattern.
    ///
    /// The pattern keeps raw regex semantics. Unlike exact-name selection
    /// it is not escaped.
    pub async fn run_by_pattern(&mut self, pattern: &str) -> Result<RunOutcome> {
        self.ensure_discovered().await?;
        self.last_operation = Some(LastOperation::RunByPattern(pattern.to_string()));

        let tests = self.tests.as_deref().unwrap_or_default();
        if tests.is_empty() {
            return Ok(RunOutcome::NoTestsFound);
        }

        let files = dedupe_files(tests.iter().map(|test| test.file.clone()));
        let result = self.execute(files, Some(pattern.to_string())).await?;
        Ok(RunOutcome::Completed(result))
    }

    /// Re-run only the tests that failed in the last completed run.
    ///
    /// A file holding both passing and failing tests re-runs only its
    /// failing ones: the grep is an alternation of exact patterns.
    pub async fn run_failed(&mut self) -> Result<RunOutcome> {
        let failed = match &self.last_result {
            Some(result) if !result.failed.is_empty() => result.failed.clone(),
            _ => {
                debug!("no failed tests recorded; nothing to rerun");
                return Ok(RunOutcome::NothingToRerun);
            }
        };

        self.last_operation = Some(LastOperation::RunFailed);

        let files = dedupe_files(failed.iter().map(|test| test.file.clone()));
        let grep = identity::alternation_grep(failed.iter().map(|test| test.full_name.as_str()));

        let result = self.execute(files, Some(grep)).await?;
        Ok(RunOutcome::Completed(result))
    }

    /// Replay whichever operation was last invoked, with its recorded
    /// parameters.
    pub async fn run_last_set(&mut self) -> Result<RunOutcome> {
        let last = match self.last_operation.clone() {
            Some(last) => last,
            None => return Ok(RunOutcome::NothingToRerun),
        };

        match last {
            LastOperation::RunAll => self.run_all().await,
            LastOperation::RunSelected(test) => self.run_selected(&test).await,
            LastOperation::RunByPattern(pattern) => self.run_by_pattern(&pattern).await,
            LastOperation::RunFailed => self.run_failed().await,
        }
    }

    async fn ensure_discovered(&mut self) -> Result<()> {
        if self.tests.is_none() {
            self.discover().await?;
        }
        Ok(())
    }

    /// Spawn the execution worker and replace the cached last result.
    async fn execute(&mut self, files: Vec<PathBuf>, grep: Option<String>) -> Result<RunResult> {
        let request = ExecuteRequest {
            files,
            options: self.options.clone(),
            grep,
            root_path: self.root.clone(),
        };
        let payload = encode(&request)?;

        let output = self
            .backend
            .run_worker(WorkerKind::Execution, payload)
            .await?;
        let result = parse_execution_output(&output)?;

        info!(failed = result.failed.len(), "execution completed");
        self.last_result = Some(result.clone());
        Ok(result)
    }
}

fn encode<T: serde::Serialize>(request: &T) -> Result<String> {
    protocol::encode_request(request).map_err(|err| RunnerError::Other(err.into()))
}

/// Drop duplicate files while keeping first-seen order.
fn dedupe_files(files: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    files
        .into_iter()
        .filter(|file| seen.insert(file.clone()))
        .collect()
}

/// Reconcile a finished discovery worker.
///
/// Exit 0 must carry the identity array; a non-zero exit must carry the
/// worker's own `{message, stack}` report. Anything else means the
/// worker's error-reporting path itself failed.
fn parse_discovery_output(output: &WorkerOutput) -> Result<Vec<TestIdentity>> {
    let payload = String::from_utf8_lossy(&output.result);
    let payload = payload.trim();

    if output.exit_code == 0 {
        return serde_json::from_str(payload).map_err(|err| RunnerError::MalformedWorkerOutput {
            detail: describe_payload(output.exit_code, payload, &err),
        });
    }

    match serde_json::from_str::<WorkerFailure>(payload) {
        Ok(failure) => Err(RunnerError::DiscoveryFailed {
            message: failure.message,
            stack: failure.stack,
        }),
        Err(err) => Err(RunnerError::MalformedWorkerOutput {
            detail: describe_payload(output.exit_code, payload, &err),
        }),
    }
}

/// Reconcile a finished execution worker.
///
/// A payload parsing as `{failed}` is a completed run regardless of exit
/// code: the code is the framework's failure count, not a protocol
/// signal. Everything else is a worker breakdown, surfaced generically.
fn parse_execution_output(output: &WorkerOutput) -> Result<RunResult> {
    let payload = String::from_utf8_lossy(&output.result);
    let payload = payload.trim();

    if let Ok(result) = serde_json::from_str::<RunResult>(payload) {
        return Ok(result);
    }

    if let Ok(failure) = serde_json::from_str::<WorkerFailure>(payload) {
        return Err(RunnerError::MalformedWorkerOutput {
            detail: failure.message,
        });
    }

    Err(RunnerError::MalformedWorkerOutput {
        detail: format!(
            "exit code {}, result channel carried {}",
            output.exit_code,
            snippet(payload)
        ),
    })
}

fn describe_payload(exit_code: i32, payload: &str, err: &serde_json::Error) -> String {
    format!(
        "exit code {exit_code}: {err}; result channel carried {}",
        snippet(payload)
    )
}

fn snippet(payload: &str) -> String {
    if payload.is_empty() {
        return "no data".to_string();
    }

    const LIMIT: usize = 120;
    let mut end = payload.len().min(LIMIT);
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    if end < payload.len() {
        format!("`{}...`", &payload[..end])
    } else {
        format!("`{payload}`")
    }
}
