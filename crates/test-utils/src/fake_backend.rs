use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use testmux::errors::Result;
use testmux::identity::TestIdentity;
use testmux::orchestrator::{WorkerBackend, WorkerKind, WorkerOutput};
use testmux::protocol::{RunResult, WorkerFailure, WORKER_FAILURE_EXIT};
use testmux::worker::{run_discovery, run_execution};

use crate::fake_engine::ScriptedEngine;

/// A worker backend that returns scripted raw outputs and records every
/// invocation, so orchestrator tests can assert on payloads and on whether
/// a worker was spawned at all.
pub struct FakeWorkerBackend {
    discovery: VecDeque<WorkerOutput>,
    execution: VecDeque<WorkerOutput>,
    pub invocations: Arc<Mutex<Vec<(WorkerKind, String)>>>,
}

impl FakeWorkerBackend {
    pub fn new() -> Self {
        Self {
            discovery: VecDeque::new(),
            execution: VecDeque::new(),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful discovery: the identity array, exit 0.
    pub fn push_discovery_tests(&mut self, tests: &[TestIdentity]) {
        self.discovery.push_back(WorkerOutput {
            exit_code: 0,
            result: serde_json::to_vec(tests).expect("serializing scripted tests"),
        });
    }

    /// Queue a failed discovery: `{message, stack}`, failure exit.
    pub fn push_discovery_failure(&mut self, message: &str, stack: Option<&str>) {
        let failure = WorkerFailure {
            message: message.to_string(),
            stack: stack.map(|s| s.to_string()),
        };
        self.discovery.push_back(WorkerOutput {
            exit_code: WORKER_FAILURE_EXIT,
            result: serde_json::to_vec(&failure).expect("serializing scripted failure"),
        });
    }

    /// Queue a completed execution run; the exit code is the failure count
    /// unless overridden.
    pub fn push_execution_result(&mut self, result: &RunResult) {
        self.execution.push_back(WorkerOutput {
            exit_code: result.failed.len() as i32,
            result: serde_json::to_vec(result).expect("serializing scripted result"),
        });
    }

    /// Queue a raw output for either worker kind, bytes untouched.
    pub fn push_raw(&mut self, kind: WorkerKind, exit_code: i32, result: &[u8]) {
        let output = WorkerOutput {
            exit_code,
            result: result.to_vec(),
        };
        match kind {
            WorkerKind::Discovery => self.discovery.push_back(output),
            WorkerKind::Execution => self.execution.push_back(output),
        }
    }

    pub fn invocations(&self) -> Vec<(WorkerKind, String)> {
        self.invocations.lock().unwrap().clone()
    }
}

impl Default for FakeWorkerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerBackend for FakeWorkerBackend {
    fn run_worker(
        &mut self,
        kind: WorkerKind,
        payload: String,
    ) -> Pin<Box<dyn Future<Output = Result<WorkerOutput>> + Send + '_>> {
        self.invocations.lock().unwrap().push((kind, payload));

        let next = match kind {
            WorkerKind::Discovery => self.discovery.pop_front(),
            WorkerKind::Execution => self.execution.pop_front(),
        };

        Box::pin(async move {
            next.ok_or_else(|| anyhow!("no scripted output queued for {kind:?}").into())
        })
    }
}

/// A backend that short-circuits the process boundary: payloads run
/// through the real worker entry points against a [`ScriptedEngine`], in
/// process. This exercises the full orchestrator ↔ worker protocol (argv
/// JSON in, channel bytes out) without spawning anything.
pub struct EngineBackend {
    engine: ScriptedEngine,
    pub log_lines: Arc<Mutex<Vec<String>>>,
    pub invocations: Arc<Mutex<Vec<(WorkerKind, String)>>>,
}

impl EngineBackend {
    pub fn new(engine: ScriptedEngine) -> Self {
        Self {
            engine,
            log_lines: Arc::new(Mutex::new(Vec::new())),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log_lines.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> Vec<(WorkerKind, String)> {
        self.invocations.lock().unwrap().clone()
    }
}

impl WorkerBackend for EngineBackend {
    fn run_worker(
        &mut self,
        kind: WorkerKind,
        payload: String,
    ) -> Pin<Box<dyn Future<Output = Result<WorkerOutput>> + Send + '_>> {
        self.invocations.lock().unwrap().push((kind, payload.clone()));

        let mut engine = self.engine.clone();
        let log_lines = Arc::clone(&self.log_lines);

        Box::pin(async move {
            let mut log = Vec::new();
            let mut result = Vec::new();

            let exit_code = match kind {
                WorkerKind::Discovery => {
                    run_discovery(&mut engine, &payload, &mut log, &mut result)
                }
                WorkerKind::Execution => {
                    run_execution(&mut engine, &payload, &mut log, &mut result)
                }
            };

            let rendered = String::from_utf8_lossy(&log);
            log_lines
                .lock()
                .unwrap()
                .extend(rendered.lines().map(|line| line.to_string()));

            Ok(WorkerOutput { exit_code, result })
        })
    }
}
