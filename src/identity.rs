// src/identity.rs

//! Test identity model and grep construction.
//!
//! A [`TestIdentity`] is the addressable record of one test case. Its
//! `full_name` is the exact-match key for selective re-runs: the execution
//! worker anchors the grep it receives as `^(grep)$`, so anything built
//! here must already be escaped and anchored per test.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Separator between suite titles in a fully-qualified test name.
///
/// Matches the framework's own qualified-title convention, so a grep built
/// from `full_name` matches the title the framework compares against.
pub const NAME_SEPARATOR: &str = " ";

/// One discovered test case.
///
/// Serialized with camelCase keys: this struct is also the wire format on
/// the worker result channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestIdentity {
    /// The test's own title (leaf name, not qualified).
    pub name: String,
    /// All enclosing suite titles plus `name`, joined with
    /// [`NAME_SEPARATOR`]. Computed once at discovery time.
    pub full_name: String,
    /// Enclosing suite titles, outermost first. Never contains empty
    /// titles: the anonymous root suite is filtered out.
    pub suite_path: Vec<String>,
    /// Absolute path to the source file containing the test.
    pub file: PathBuf,
}

impl TestIdentity {
    /// Build an identity from a suite-title stack and a leaf name.
    ///
    /// Empty titles are dropped from the stored path, keeping the
    /// invariant `full_name == suite_path ⧺ [name] joined by the
    /// separator` exact.
    pub fn new(
        suite_stack: &[String],
        name: impl Into<String>,
        file: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        let suite_path: Vec<String> = suite_stack
            .iter()
            .filter(|title| !title.is_empty())
            .cloned()
            .collect();
        let full_name = full_name_of(&suite_path, &name);

        Self {
            name,
            full_name,
            suite_path,
            file: file.into(),
        }
    }
}

/// Join a (pre-filtered) suite path and a leaf name into a qualified name.
pub fn full_name_of(suite_path: &[String], name: &str) -> String {
    if suite_path.is_empty() {
        name.to_string()
    } else {
        let mut parts = suite_path.to_vec();
        parts.push(name.to_string());
        parts.join(NAME_SEPARATOR)
    }
}

/// Grep selecting exactly one test by its qualified name.
///
/// Anchored and escaped so that sibling tests sharing a prefix ("add" vs
/// "add items") cannot cross-match.
pub fn exact_grep(full_name: &str) -> String {
    format!("^{}$", regex::escape(full_name))
}

/// Grep selecting exactly the given tests, as an alternation of anchored
/// escaped names.
pub fn alternation_grep<'a>(full_names: impl IntoIterator<Item = &'a str>) -> String {
    full_names
        .into_iter()
        .map(|full_name| format!("^({})$", regex::escape(full_name)))
        .collect::<Vec<_>>()
        .join("|")
}
