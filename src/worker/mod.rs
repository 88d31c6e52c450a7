// src/worker/mod.rs

//! Worker-side protocol implementation.
//!
//! Everything in this module runs *inside* a spawned worker process, on the
//! far side of the command-line contract. The test framework itself stays a
//! black box behind the [`TestEngine`] trait; this module owns the parts
//! around it:
//!
//! - [`engine`] defines the suite-declaration model, the framework event
//!   stream, and the `TestEngine` seam.
//! - [`discover`] expands the file glob, loads declarations, and flattens
//!   the suite tree into the ordered identity list.
//! - [`execute`] registers the caller-chosen files, applies the grep, and
//!   folds the framework's event stream into a failure summary.
//!
//! Entry points take the raw argv payload plus the two channel writers and
//! return the process exit code, so an embedding binary reduces to reading
//! `argv[1]` and calling `std::process::exit`. Script-based runtimes (e.g.
//! a Node.js adapter driving Mocha) implement this same contract on their
//! side of the fence; this module is the canonical implementation used by
//! in-process engines and by the test suite.

pub mod discover;
pub mod engine;
pub mod execute;

pub use discover::{expand_glob, flatten_suites, run_discovery};
pub use engine::{RunEvent, SuiteDecl, TestDecl, TestEngine};
pub use execute::{run_execution, FailureCollector};
