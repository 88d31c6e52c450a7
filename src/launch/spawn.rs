// src/launch/spawn.rs

//! Worker process spawning.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::info;

use crate::errors::{Result, RunnerError};

use super::locate::locate_runtime;

/// Everything needed to start one worker process.
///
/// Immutable; built fresh per spawn and never persisted.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    /// Script handed to the runtime as its first argument.
    pub script: PathBuf,
    /// Remaining arguments, typically a single JSON document.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub working_dir: PathBuf,
    /// Environment overrides, merged over (not replacing) the parent
    /// process environment.
    pub env: BTreeMap<String, String>,
}

/// Spawn a worker: `runtime script args...` with both stdio channels piped.
///
/// A bare runtime name is resolved through the search path; a name
/// containing a path separator is used as-is, mirroring how shells resolve
/// commands. Failure to *find* the runtime and failure to *start* it are
/// distinct: [`RunnerError::RuntimeNotFound`] means nothing is installed,
/// [`RunnerError::Spawn`] means the OS rejected an existing executable.
/// The child's lifetime is tied to ours via `kill_on_drop`, so tearing the
/// host down cannot orphan it.
pub fn spawn_worker(runtime: &str, spec: &InvocationSpec) -> Result<Child> {
    let runtime_path = if runtime.contains(std::path::MAIN_SEPARATOR) || runtime.contains('/') {
        PathBuf::from(runtime)
    } else {
        locate_runtime(runtime)?
    };

    info!(
        runtime = %runtime_path.display(),
        script = %spec.script.display(),
        "spawning worker process"
    );

    let mut cmd = Command::new(&runtime_path);
    cmd.arg(&spec.script)
        .args(&spec.args)
        .current_dir(&spec.working_dir)
        .envs(&spec.env)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    cmd.spawn().map_err(RunnerError::Spawn)
}
