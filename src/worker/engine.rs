// src/worker/engine.rs

//! The seam between worker logic and the test framework.
//!
//! A `TestEngine` is whatever actually evaluates suite/test declarations
//! and runs test bodies. The worker never looks inside it: discovery only
//! needs the declared tree, execution only needs the ordered event stream.

use std::io::Write;
use std::path::PathBuf;

use regex::Regex;
use serde_json::Value;

/// One declared test, as seen during declaration-only loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDecl {
    pub title: String,
    /// Source file the declaration came from.
    pub file: PathBuf,
}

/// One declared suite and its children, sibling order as declared.
///
/// The framework's synthetic root suite has an empty title; identity
/// construction filters it out of suite paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteDecl {
    pub title: String,
    pub tests: Vec<TestDecl>,
    pub suites: Vec<SuiteDecl>,
}

impl SuiteDecl {
    /// A root suite with no title, ready to have children attached.
    pub fn root() -> Self {
        Self::default()
    }
}

/// Framework-emitted run events, in engine order.
///
/// The execution worker folds this sequence synchronously; the engine is
/// single-threaded inside the worker process, so no buffering or locking
/// is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    SuiteEnter { title: String },
    SuiteExit,
    TestFailed { title: String, file: PathBuf },
    RunEnd,
}

/// Black-box interface to the test framework inside a worker process.
pub trait TestEngine {
    /// Load `files` into a fresh framework instance configured with
    /// `options`, evaluating declarations only. No test bodies run.
    fn load(&mut self, options: &Value, files: &[PathBuf]) -> anyhow::Result<SuiteDecl>;

    /// Run the tests declared in `files`, restricted to qualified names
    /// matching `grep` when present. Framework console output goes to
    /// `log`; lifecycle events are delivered to `on_event` in order.
    /// Returns the framework's failure count.
    fn run(
        &mut self,
        options: &Value,
        files: &[PathBuf],
        grep: Option<&Regex>,
        log: &mut dyn Write,
        on_event: &mut dyn FnMut(RunEvent),
    ) -> anyhow::Result<i32>;
}
