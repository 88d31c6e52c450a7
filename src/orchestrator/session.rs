// src/orchestrator/session.rs

//! Session state persistence for short-lived hosts.
//!
//! The orchestrator's caches live in memory for the lifetime of one
//! instance. A long-lived host (an editor session) keeps a single instance
//! around; a one-shot host like the CLI persists a snapshot between
//! invocations so that re-run-failed and re-run-last still work. The
//! snapshot lives under a `.testmux/` directory in the workspace root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::Result;
use crate::identity::TestIdentity;
use crate::protocol::RunResult;

use super::LastOperation;

const SESSION_DIR: &str = ".testmux";
const SESSION_FILE: &str = "session.json";

/// Serializable copy of the orchestrator's caches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub tests: Option<Vec<TestIdentity>>,
    pub last_result: Option<RunResult>,
    pub last_operation: Option<LastOperation>,
}

fn session_path(root: &Path) -> PathBuf {
    root.join(SESSION_DIR).join(SESSION_FILE)
}

/// Load the persisted snapshot for `root`, if one exists.
///
/// A missing or unreadable snapshot is an empty session, not an error.
/// Stale state must never block a fresh run.
pub fn load_session(root: &Path) -> SessionSnapshot {
    let path = session_path(root);
    match std::fs::read(&path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "ignoring unreadable session file");
                SessionSnapshot::default()
            }
        },
        Err(_) => SessionSnapshot::default(),
    }
}

/// Persist the snapshot for `root`.
pub fn save_session(root: &Path, snapshot: &SessionSnapshot) -> Result<()> {
    let path = session_path(root);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let bytes = serde_json::to_vec_pretty(snapshot).map_err(anyhow::Error::from)?;
    std::fs::write(&path, bytes)?;
    debug!(path = %path.display(), "session snapshot saved");
    Ok(())
}
