use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use regex::Regex;
use serde_json::Value;

use testmux::identity::full_name_of;
use testmux::worker::{RunEvent, SuiteDecl, TestEngine};

/// A scripted in-memory engine standing in for the real test framework.
///
/// It is built from a declared suite tree plus a set of qualified names
/// that should fail when run. `load` returns the declarations for the
/// requested files without "running" anything; `run` walks the tree
/// depth-first, honouring the file scope and the grep, and emits the same
/// event sequence a real framework reporter would see.
///
/// Qualified names executed during `run` are recorded in `ran`, shared
/// across clones, so tests can assert exactly which tests a grep selected.
#[derive(Clone)]
pub struct ScriptedEngine {
    tree: SuiteDecl,
    failing: HashSet<String>,
    load_error: Option<String>,
    pub ran: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEngine {
    pub fn new(tree: SuiteDecl) -> Self {
        Self {
            tree,
            failing: HashSet::new(),
            load_error: None,
            ran: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mark a qualified test name as failing.
    pub fn fail(mut self, full_name: &str) -> Self {
        self.failing.insert(full_name.to_string());
        self
    }

    /// Make every `load` call fail, simulating a syntax error or missing
    /// module in a test file.
    pub fn with_load_error(mut self, message: &str) -> Self {
        self.load_error = Some(message.to_string());
        self
    }

    pub fn ran_tests(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }
}

impl TestEngine for ScriptedEngine {
    fn load(&mut self, _options: &Value, files: &[PathBuf]) -> anyhow::Result<SuiteDecl> {
        if let Some(message) = &self.load_error {
            bail!("{message}");
        }

        let scope: HashSet<&PathBuf> = files.iter().collect();
        Ok(filter_to_files(&self.tree, &scope))
    }

    fn run(
        &mut self,
        _options: &Value,
        files: &[PathBuf],
        grep: Option<&Regex>,
        log: &mut dyn Write,
        on_event: &mut dyn FnMut(RunEvent),
    ) -> anyhow::Result<i32> {
        let scope: HashSet<&PathBuf> = files.iter().collect();
        let tree = self.tree.clone();
        let mut stack = Vec::new();
        let failures = self.walk(&tree, &mut stack, &scope, grep, log, on_event)?;
        on_event(RunEvent::RunEnd);
        Ok(failures)
    }
}

impl ScriptedEngine {
    fn walk(
        &self,
        suite: &SuiteDecl,
        stack: &mut Vec<String>,
        scope: &HashSet<&PathBuf>,
        grep: Option<&Regex>,
        log: &mut dyn Write,
        on_event: &mut dyn FnMut(RunEvent),
    ) -> anyhow::Result<i32> {
        on_event(RunEvent::SuiteEnter {
            title: suite.title.clone(),
        });
        stack.push(suite.title.clone());

        let mut failures = 0;
        let titles: Vec<String> = stack.iter().filter(|t| !t.is_empty()).cloned().collect();

        for test in &suite.tests {
            if !scope.contains(&test.file) {
                continue;
            }

            let full_name = full_name_of(&titles, &test.title);
            if let Some(grep) = grep {
                if !grep.is_match(&full_name) {
                    continue;
                }
            }

            self.ran.lock().unwrap().push(full_name.clone());

            if self.failing.contains(&full_name) {
                writeln!(log, "  x {full_name}")?;
                on_event(RunEvent::TestFailed {
                    title: test.title.clone(),
                    file: test.file.clone(),
                });
                failures += 1;
            } else {
                writeln!(log, "  v {full_name}")?;
            }
        }

        for child in &suite.suites {
            failures += self.walk(child, stack, scope, grep, log, on_event)?;
        }

        stack.pop();
        on_event(RunEvent::SuiteExit);
        Ok(failures)
    }
}

fn filter_to_files(suite: &SuiteDecl, scope: &HashSet<&PathBuf>) -> SuiteDecl {
    SuiteDecl {
        title: suite.title.clone(),
        tests: suite
            .tests
            .iter()
            .filter(|test| scope.contains(&test.file))
            .cloned()
            .collect(),
        suites: suite
            .suites
            .iter()
            .map(|child| filter_to_files(child, scope))
            .collect(),
    }
}
