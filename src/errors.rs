// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Every failure that crosses the orchestrator boundary is one of these
//! variants; raw process-level errors never reach the caller. Informational
//! outcomes ("no tests found", "nothing to rerun") are *not* errors; they
//! live in [`crate::orchestrator::RunOutcome`].

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// No executable of the expected name exists anywhere on the search path.
    #[error("cannot find `{0}` on the executable search path")]
    RuntimeNotFound(String),

    /// The runtime was located but the OS refused to start the child.
    #[error("failed to start worker process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The discovery worker caught an exception while loading test files.
    #[error("test discovery failed: {message}")]
    DiscoveryFailed {
        message: String,
        stack: Option<String>,
    },

    /// The result channel carried something that is not the expected JSON
    /// document. The worker's own error-reporting path failed, so this is
    /// surfaced generically.
    #[error("worker produced unreadable output: {detail}")]
    MalformedWorkerOutput { detail: String },

    /// The worker ran past the configured deadline and was killed.
    #[error("worker did not finish within {0:?}")]
    WorkerTimeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunnerError>;
