// src/orchestrator/backend.rs

//! Pluggable worker backend abstraction.
//!
//! The orchestrator talks to a `WorkerBackend` instead of spawning
//! processes directly. This keeps the state machine testable with a fake
//! backend while the production implementation owns the real process
//! plumbing.
//!
//! - `ProcessBackend` is the default implementation: it locates the
//!   runtime, spawns the worker script, streams the log channel line by
//!   line, and accumulates the result channel until exit.
//! - Tests can provide their own `WorkerBackend` that records invocations
//!   and returns scripted output.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{Result, RunnerError};
use crate::launch::{spawn_worker, InvocationSpec};

/// Which worker script an invocation should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Discovery,
    Execution,
}

/// Everything a worker run produces once the process has exited.
///
/// The result channel is handed over fully accumulated: the JSON payload
/// may arrive fragmented across reads and must never be parsed
/// incrementally.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    pub exit_code: i32,
    pub result: Vec<u8>,
}

/// Trait abstracting how worker invocations are executed.
pub trait WorkerBackend: Send {
    /// Run one worker to completion with the given argv payload.
    fn run_worker(
        &mut self,
        kind: WorkerKind,
        payload: String,
    ) -> Pin<Box<dyn Future<Output = Result<WorkerOutput>> + Send + '_>>;
}

/// Production backend: real subprocesses over the located runtime.
pub struct ProcessBackend {
    runtime: String,
    root: PathBuf,
    discover_script: PathBuf,
    execute_script: PathBuf,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
    log_tx: mpsc::Sender<String>,
}

impl ProcessBackend {
    /// `env` is the caller-configured override map; the module-resolution
    /// path for `root` is added underneath it, caller keys winning.
    pub fn new(
        runtime: impl Into<String>,
        root: impl Into<PathBuf>,
        discover_script: impl Into<PathBuf>,
        execute_script: impl Into<PathBuf>,
        env: BTreeMap<String, String>,
        timeout: Option<Duration>,
        log_tx: mpsc::Sender<String>,
    ) -> Self {
        let root = root.into();
        let env = env_with_module_path(&root, env);

        Self {
            runtime: runtime.into(),
            root,
            discover_script: discover_script.into(),
            execute_script: execute_script.into(),
            env,
            timeout,
            log_tx,
        }
    }

    fn script_for(&self, kind: WorkerKind) -> &Path {
        match kind {
            WorkerKind::Discovery => &self.discover_script,
            WorkerKind::Execution => &self.execute_script,
        }
    }

    async fn run_worker_inner(&self, kind: WorkerKind, payload: String) -> Result<WorkerOutput> {
        let spec = InvocationSpec {
            script: self.script_for(kind).to_path_buf(),
            args: vec![payload],
            working_dir: self.root.clone(),
            env: self.env.clone(),
        };

        let mut child = spawn_worker(&self.runtime, &spec)?;

        // Log channel: forwarded line by line as it arrives.
        let log_task = child.stdout.take().map(|stdout| {
            let log_tx = self.log_tx.clone();
            tokio::spawn(async move {
                let reader = BufReader::new(stdout);
                let mut lines = reader.lines();

                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(channel = "log", "{line}");
                    // Receiver may be gone; keep draining anyway so the
                    // child never blocks on a full pipe.
                    let _ = log_tx.send(line).await;
                }
            })
        });

        // Result channel: accumulated fully before anyone may parse it.
        let result_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buffer = Vec::new();
                if let Err(err) = stderr.read_to_end(&mut buffer).await {
                    warn!(error = %err, "reading worker result channel failed");
                }
                buffer
            })
        });

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(?kind, ?limit, "worker ran past deadline; killing it");
                    let _ = child.kill().await;
                    return Err(RunnerError::WorkerTimeout(limit));
                }
            },
            None => child.wait().await?,
        };

        let result = match result_task {
            Some(task) => task.await.map_err(anyhow::Error::from)?,
            None => Vec::new(),
        };
        if let Some(task) = log_task {
            task.await.map_err(anyhow::Error::from)?;
        }

        let exit_code = status.code().unwrap_or(-1);
        info!(?kind, exit_code, "worker process exited");

        Ok(WorkerOutput { exit_code, result })
    }
}

impl WorkerBackend for ProcessBackend {
    fn run_worker(
        &mut self,
        kind: WorkerKind,
        payload: String,
    ) -> Pin<Box<dyn Future<Output = Result<WorkerOutput>> + Send + '_>> {
        Box::pin(self.run_worker_inner(kind, payload))
    }
}

/// Merge the module-resolution path for `root` under the caller overrides.
fn env_with_module_path(root: &Path, overrides: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert(
        "NODE_PATH".to_string(),
        root.join("node_modules").to_string_lossy().into_owned(),
    );
    env.extend(overrides);
    env
}
