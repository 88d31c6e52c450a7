// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, RunnerError};
use crate::protocol::{FilePatterns, DEFAULT_GLOB, DEFAULT_IGNORE};

/// Top-level configuration as read from `Testmux.toml`.
///
/// ```toml
/// [runtime]
/// executable = "node"
///
/// [runtime.env]
/// NODE_ENV = "test"
///
/// [workers]
/// discover = "worker/discover.js"
/// execute = "worker/execute.js"
/// timeout_secs = 300
///
/// [files]
/// glob = "test/**/*.js"
/// ignore = "**/{.git,node_modules}/**"
///
/// [framework.options]
/// ui = "bdd"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// External runtime settings from `[runtime]`.
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// Worker script wiring from `[workers]`.
    #[serde(default)]
    pub workers: WorkersSection,

    /// Discovery glob scope from `[files]`.
    #[serde(default)]
    pub files: FilesSection,

    /// Framework pass-through from `[framework]`.
    #[serde(default)]
    pub framework: FrameworkSection,
}

/// `[runtime]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// Executable name probed on the search path.
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Environment overrides for worker processes, merged over the parent
    /// environment. Overrides win over the built-in module-resolution path.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_executable() -> String {
    "node".to_string()
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            env: BTreeMap::new(),
        }
    }
}

/// `[workers]` section.
///
/// Script paths are resolved relative to the workspace root at spawn time.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkersSection {
    #[serde(default = "default_discover_script")]
    pub discover: PathBuf,

    #[serde(default = "default_execute_script")]
    pub execute: PathBuf,

    /// Per-worker deadline. `None` means no timeout is enforced.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_discover_script() -> PathBuf {
    PathBuf::from("worker/discover.js")
}

fn default_execute_script() -> PathBuf {
    PathBuf::from("worker/execute.js")
}

impl Default for WorkersSection {
    fn default() -> Self {
        Self {
            discover: default_discover_script(),
            execute: default_execute_script(),
            timeout_secs: None,
        }
    }
}

impl WorkersSection {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// `[files]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesSection {
    #[serde(default = "default_glob")]
    pub glob: String,

    #[serde(default = "default_ignore")]
    pub ignore: String,
}

fn default_glob() -> String {
    DEFAULT_GLOB.to_string()
}

fn default_ignore() -> String {
    DEFAULT_IGNORE.to_string()
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            glob: default_glob(),
            ignore: default_ignore(),
        }
    }
}

impl FilesSection {
    pub fn to_patterns(&self) -> FilePatterns {
        FilePatterns {
            glob: self.glob.clone(),
            ignore: self.ignore.clone(),
        }
    }
}

/// `[framework]` section.
///
/// `options` is deliberately free-form: it is forwarded verbatim to the
/// workers, which hand it to the framework untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameworkSection {
    #[serde(default)]
    pub options: Option<toml::Table>,
}

impl FrameworkSection {
    /// The options table as the JSON value carried on the wire.
    pub fn options_json(&self) -> Result<serde_json::Value> {
        match &self.options {
            Some(table) => serde_json::to_value(table)
                .map_err(|err| RunnerError::Config(format!("framework options: {err}"))),
            None => Ok(serde_json::Value::Object(serde_json::Map::new())),
        }
    }
}
