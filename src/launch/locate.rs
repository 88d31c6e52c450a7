// src/launch/locate.rs

//! Runtime executable lookup.
//!
//! Scans every directory on the executable search path, in order, probing
//! each candidate for existence and execute permission. Nothing is cached:
//! the PATH or the installation can change between invocations, so every
//! call re-probes.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{Result, RunnerError};

/// Locate `name` on the current process's `PATH`.
///
/// Returns the first directory-joined candidate that exists and is
/// executable; fails with [`RunnerError::RuntimeNotFound`] when no entry
/// qualifies (including when `PATH` is unset).
pub fn locate_runtime(name: &str) -> Result<PathBuf> {
    let path_value = std::env::var_os("PATH").unwrap_or_default();
    locate_runtime_in(&path_value, name)
}

/// Locate `name` using an explicit search-path value.
///
/// Split on the platform separator (`;` on Windows, `:` elsewhere).
/// Directories that do not exist are skipped, not errors.
pub fn locate_runtime_in(path_value: &OsStr, name: &str) -> Result<PathBuf> {
    for dir in std::env::split_paths(path_value) {
        for candidate_name in candidate_names(name) {
            let candidate = dir.join(&candidate_name);
            if is_executable(&candidate) {
                debug!(runtime = %candidate.display(), "located runtime executable");
                return Ok(candidate);
            }
        }
    }

    Err(RunnerError::RuntimeNotFound(name.to_string()))
}

/// Filenames to probe per directory. Windows installs commonly carry the
/// `.exe` suffix, so both variants are tried there.
fn candidate_names(name: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![name.to_string(), format!("{name}.exe")]
    } else {
        vec![name.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
