// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `testmux`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "testmux",
    version,
    about = "Discover and re-run tests in an external test runtime.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Testmux.toml` in the current working directory. A missing
    /// file falls back to built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Testmux.toml")]
    pub config: String,

    /// Workspace root containing the test files.
    ///
    /// Default: the directory containing the config file, or the current
    /// working directory.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TESTMUX_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

/// The five re-run operations plus discovery listing.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Discover all tests and run them.
    RunAll,
    /// Run exactly one test by its fully-qualified name.
    RunOne {
        /// The qualified name as printed by `list`.
        #[arg(value_name = "FULL_NAME")]
        full_name: String,
    },
    /// Run tests whose qualified name matches a regular expression.
    RunPattern {
        /// Raw regex; anchored by the worker as `^(PATTERN)$`.
        #[arg(value_name = "PATTERN")]
        pattern: String,
    },
    /// Re-run only the tests that failed in the last run.
    RunFailed,
    /// Replay the last run operation with the same parameters.
    RunLast,
    /// Discover tests and print them without running anything.
    List,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
