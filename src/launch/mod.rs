// src/launch/mod.rs

//! Process launching layer.
//!
//! Locates the external runtime executable on the search path and spawns
//! worker processes with piped stdio, using `tokio::process::Command`.
//!
//! - [`locate`] owns the PATH probe.
//! - [`spawn`] owns [`InvocationSpec`] and child process creation.

pub mod locate;
pub mod spawn;

pub use locate::{locate_runtime, locate_runtime_in};
pub use spawn::{spawn_worker, InvocationSpec};
