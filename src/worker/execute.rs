// src/worker/execute.rs

//! Execution worker: grep restriction and failure collection.

use std::io::Write;

use anyhow::{Context, Result};
use regex::Regex;

use crate::identity::TestIdentity;
use crate::protocol::{self, ExecuteRequest, RunResult, WorkerFailure, WORKER_FAILURE_EXIT};

use super::engine::{RunEvent, TestEngine};

/// Execution worker entry point.
///
/// Decodes the argv-carried request, echoes the configuration to the log
/// channel, runs the engine over exactly the requested files, and writes
/// the `{failed}` summary as the single result-channel document. Returns
/// the framework's failure count as the exit code, or a failure exit after
/// a `{message, stack}` payload if the worker itself broke down.
pub fn run_execution<E: TestEngine>(
    engine: &mut E,
    raw_request: &str,
    log: &mut dyn Write,
    result: &mut dyn Write,
) -> i32 {
    match execute(engine, raw_request, log) {
        Ok((run_result, failures)) => match serde_json::to_writer(result, &run_result) {
            Ok(()) => failures,
            Err(_) => WORKER_FAILURE_EXIT,
        },
        Err(err) => {
            let failure = WorkerFailure::from_error(&err);
            let _ = serde_json::to_writer(result, &failure);
            WORKER_FAILURE_EXIT
        }
    }
}

fn execute<E: TestEngine>(
    engine: &mut E,
    raw_request: &str,
    log: &mut dyn Write,
) -> Result<(RunResult, i32)> {
    let request: ExecuteRequest =
        protocol::decode_request(raw_request).context("decoding execution request")?;

    echo_configuration(&request, log)?;

    // The caller has already escaped literal names and combined
    // alternations; the worker only anchors.
    let grep = match request.grep.as_deref() {
        Some(grep) => Some(
            Regex::new(&format!("^({grep})$"))
                .with_context(|| format!("invalid grep pattern: {grep}"))?,
        ),
        None => None,
    };

    let mut collector = FailureCollector::new();
    let failures = engine
        .run(
            &request.options,
            &request.files,
            grep.as_ref(),
            log,
            &mut |event| collector.observe(event),
        )
        .context("running tests")?;

    Ok((collector.finish(), failures))
}

/// Human-visible configuration echo on the log channel. Plumbing only;
/// nothing downstream parses this.
fn echo_configuration(request: &ExecuteRequest, log: &mut dyn Write) -> Result<()> {
    match &request.options {
        serde_json::Value::Object(map) if !map.is_empty() => {
            writeln!(log, "Applying framework options:")?;
            let rendered = serde_json::to_string_pretty(&request.options)?;
            for line in rendered.lines() {
                writeln!(log, "  {line}")?;
            }
        }
        _ => writeln!(log, "No framework options are configured.")?,
    }

    writeln!(log)?;
    writeln!(log, "Test file(s):")?;
    for file in &request.files {
        writeln!(log, "  {}", file.display())?;
    }

    Ok(())
}

/// Synchronous fold over the framework event stream.
///
/// Suite-enter/suite-exit maintain the ancestor-title stack; each
/// test-fail event is recorded with the stack as it stood when the failure
/// was observed, so ordering and qualification always reflect the run.
#[derive(Debug, Default)]
pub struct FailureCollector {
    suite_stack: Vec<String>,
    failed: Vec<TestIdentity>,
}

impl FailureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: RunEvent) {
        match event {
            RunEvent::SuiteEnter { title } => self.suite_stack.push(title),
            RunEvent::SuiteExit => {
                self.suite_stack.pop();
            }
            RunEvent::TestFailed { title, file } => {
                self.failed
                    .push(TestIdentity::new(&self.suite_stack, title, file));
            }
            RunEvent::RunEnd => {}
        }
    }

    pub fn finish(self) -> RunResult {
        RunResult {
            failed: self.failed,
        }
    }
}
