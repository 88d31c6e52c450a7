// src/worker/discover.rs

//! Discovery worker: glob expansion, declaration loading, tree flattening.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::identity::TestIdentity;
use crate::protocol::{self, DiscoverRequest, WorkerFailure, WORKER_FAILURE_EXIT};

use super::engine::{SuiteDecl, TestEngine};

/// Discovery worker entry point.
///
/// Decodes the argv-carried request, expands the glob, loads declarations
/// through the engine, and writes the flattened identity list as exactly
/// one JSON document on the result channel. Returns the process exit code:
/// 0 on success, non-zero after writing a `{message, stack}` payload on
/// any failure.
pub fn run_discovery<E: TestEngine>(
    engine: &mut E,
    raw_request: &str,
    log: &mut dyn Write,
    result: &mut dyn Write,
) -> i32 {
    match discover(engine, raw_request, log) {
        Ok(tests) => match serde_json::to_writer(result, &tests) {
            Ok(()) => 0,
            Err(_) => WORKER_FAILURE_EXIT,
        },
        Err(err) => {
            let failure = WorkerFailure::from_error(&err);
            let _ = serde_json::to_writer(result, &failure);
            WORKER_FAILURE_EXIT
        }
    }
}

fn discover<E: TestEngine>(
    engine: &mut E,
    raw_request: &str,
    log: &mut dyn Write,
) -> Result<Vec<TestIdentity>> {
    let request: DiscoverRequest =
        protocol::decode_request(raw_request).context("decoding discovery request")?;

    let files = expand_glob(&request.root_path, &request.files.glob, &request.files.ignore)?;

    writeln!(log, "Discovering tests in {} file(s)", files.len())?;
    for file in &files {
        writeln!(log, "  {}", file.display())?;
    }

    let root = engine
        .load(&request.options, &files)
        .context("loading test files")?;

    Ok(flatten_suites(&root))
}

/// Expand `glob` relative to `root`, excluding `ignore` matches.
///
/// Matching is done against `/`-separated paths relative to `root`; the
/// result is absolute paths in lexicographic order, so discovery output is
/// deterministic across platforms.
pub fn expand_glob(root: &Path, glob: &str, ignore: &str) -> Result<Vec<PathBuf>> {
    let include = build_globset(glob).with_context(|| format!("invalid glob pattern: {glob}"))?;
    let exclude =
        build_globset(ignore).with_context(|| format!("invalid ignore pattern: {ignore}"))?;

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            // Root must exist; unreadable subdirectories are skipped.
            Err(err) if dir == root => {
                return Err(err).with_context(|| format!("reading {}", root.display()));
            }
            Err(_) => continue,
        };

        for entry in entries {
            let path = entry?.path();
            let rel = match path.strip_prefix(root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            if exclude.is_match(&rel) {
                continue;
            }

            if path.is_dir() {
                stack.push(path);
            } else if include.is_match(&rel) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(pattern: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new(pattern)?);
    Ok(builder.build()?)
}

/// Flatten a suite tree into the ordered discovered test set.
///
/// Breadth-first, sibling order as declared: each suite's direct tests are
/// emitted before any nested suite's, and the suite path handed to each
/// identity covers every ancestor down to and including the current suite.
pub fn flatten_suites(root: &SuiteDecl) -> Vec<TestIdentity> {
    let mut tests = Vec::new();
    let mut queue: VecDeque<(&SuiteDecl, Vec<String>)> = VecDeque::new();
    queue.push_back((root, vec![root.title.clone()]));

    while let Some((suite, path)) = queue.pop_front() {
        for test in &suite.tests {
            tests.push(TestIdentity::new(&path, test.title.clone(), &test.file));
        }

        for child in &suite.suites {
            let mut child_path = path.clone();
            child_path.push(child.title.clone());
            queue.push_back((child, child_path));
        }
    }

    tests
}
