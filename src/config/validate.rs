// src/config/validate.rs

//! Up-front configuration checks.
//!
//! Everything here could also fail later inside a worker, but a bad glob
//! or a zero timeout should be reported before any process is spawned.

use globset::Glob;

use crate::config::model::ConfigFile;
use crate::errors::{Result, RunnerError};

pub fn validate_config(config: &ConfigFile) -> Result<()> {
    Glob::new(&config.files.glob)
        .map_err(|err| RunnerError::Config(format!("files.glob: {err}")))?;
    Glob::new(&config.files.ignore)
        .map_err(|err| RunnerError::Config(format!("files.ignore: {err}")))?;

    if config.workers.timeout_secs == Some(0) {
        return Err(RunnerError::Config(
            "workers.timeout_secs must be positive; omit it to disable the timeout".to_string(),
        ));
    }

    if config.runtime.executable.trim().is_empty() {
        return Err(RunnerError::Config(
            "runtime.executable must not be empty".to_string(),
        ));
    }

    Ok(())
}
