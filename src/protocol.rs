// src/protocol.rs

//! Wire protocol between the orchestrator and worker processes.
//!
//! Each worker receives its parameters as a single argv-carried JSON
//! document and answers with exactly one JSON document on the result
//! channel (stderr). The log channel (stdout) is never parsed.
//!
//! Keys are camelCase on the wire; the schemas here are fixed: a payload
//! that does not deserialize is rejected rather than duck-typed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::TestIdentity;

/// Default glob for test sources: everything under `test/`, recursively.
pub const DEFAULT_GLOB: &str = "test/**/*.js";

/// Default ignore: version-control and dependency-cache directories.
pub const DEFAULT_IGNORE: &str = "**/{.git,node_modules}/**";

/// Parameters for a discovery worker run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverRequest {
    pub root_path: PathBuf,
    /// Framework options, forwarded verbatim. Free-form by design.
    #[serde(default = "empty_options")]
    pub options: Value,
    pub files: FilePatterns,
}

/// Glob scope for discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePatterns {
    pub glob: String,
    pub ignore: String,
}

impl Default for FilePatterns {
    fn default() -> Self {
        Self {
            glob: DEFAULT_GLOB.to_string(),
            ignore: DEFAULT_IGNORE.to_string(),
        }
    }
}

/// Parameters for an execution worker run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Exact files to register; the caller has already decided scope.
    pub files: Vec<PathBuf>,
    #[serde(default = "empty_options")]
    pub options: Value,
    /// Restriction over qualified names; the worker anchors it as
    /// `^(grep)$` and does not escape it.
    pub grep: Option<String>,
    pub root_path: PathBuf,
}

/// Terminal payload of a successful execution run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Failing tests in observation order, no dedup.
    pub failed: Vec<TestIdentity>,
}

/// Terminal payload of a worker that died before completing its job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub message: String,
    pub stack: Option<String>,
}

impl WorkerFailure {
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self {
            message: format!("{err:#}"),
            stack: Some(format!("{err:?}")),
        }
    }
}

/// Exit code a worker uses when it failed outside the framework's own
/// pass/fail accounting.
pub const WORKER_FAILURE_EXIT: i32 = -1;

fn empty_options() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Encode a request for the worker argv slot.
pub fn encode_request<T: Serialize>(request: &T) -> serde_json::Result<String> {
    serde_json::to_string(request)
}

/// Decode an argv-carried request inside a worker.
pub fn decode_request<'a, T: Deserialize<'a>>(raw: &'a str) -> serde_json::Result<T> {
    serde_json::from_str(raw)
}
