// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
pub mod launch;
pub mod logging;
pub mod orchestrator;
pub mod protocol;
pub mod worker;

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, ConfigFile};
use crate::errors::Result;
use crate::orchestrator::{
    load_session, save_session, Orchestrator, ProcessBackend, RunOutcome, WorkerBackend,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the process backend and its log-channel printer
/// - the orchestrator, with session state restored from disk
/// - command dispatch and outcome rendering
///
/// Returns the process exit code: the failure count for run commands, 0
/// otherwise.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_config(&config_path)?;

    let root = workspace_root(&args, &config_path);
    let options = cfg.framework.options_json()?;
    let patterns = cfg.files.to_patterns();

    // Worker log-channel lines stream to stdout as they arrive.
    let (log_tx, mut log_rx) = mpsc::channel::<String>(64);
    let printer = tokio::spawn(async move {
        while let Some(line) = log_rx.recv().await {
            println!("{line}");
        }
    });

    let backend = ProcessBackend::new(
        cfg.runtime.executable.as_str(),
        root.clone(),
        root.join(&cfg.workers.discover),
        root.join(&cfg.workers.execute),
        cfg.runtime.env.clone(),
        cfg.workers.timeout(),
        log_tx,
    );

    let mut orchestrator = Orchestrator::new(root.clone(), options, patterns, backend);
    orchestrator.restore(load_session(&root));

    let exit_code = dispatch(&mut orchestrator, &args.command).await?;

    save_session(&root, &orchestrator.snapshot())?;

    // Dropping the orchestrator drops the backend and with it the last log
    // sender, which lets the printer drain and finish.
    drop(orchestrator);
    let _ = printer.await;

    Ok(exit_code)
}

fn load_config(config_path: &Path) -> Result<ConfigFile> {
    if config_path.exists() {
        load_and_validate(config_path)
    } else {
        debug!(path = %config_path.display(), "no config file; using defaults");
        Ok(ConfigFile::default())
    }
}

/// Figure out the workspace root.
///
/// - `--root` wins when given.
/// - Otherwise the directory containing the config file, when it has a
///   non-empty parent (e.g. "configs/Testmux.toml").
/// - Otherwise the current working directory.
fn workspace_root(args: &CliArgs, config_path: &Path) -> PathBuf {
    if let Some(root) = &args.root {
        return root.clone();
    }

    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

async fn dispatch<W: WorkerBackend>(
    orchestrator: &mut Orchestrator<W>,
    command: &Command,
) -> Result<i32> {
    match command {
        Command::RunAll => Ok(render_outcome(orchestrator.run_all().await?)),

        Command::RunOne { full_name } => {
            if orchestrator.tests().is_none() {
                orchestrator.discover().await?;
            }

            let test = orchestrator
                .tests()
                .unwrap_or_default()
                .iter()
                .find(|test| test.full_name == *full_name)
                .cloned()
                .ok_or_else(|| anyhow!("no discovered test is named `{full_name}`"))?;

            Ok(render_outcome(orchestrator.run_selected(&test).await?))
        }

        Command::RunPattern { pattern } => {
            Ok(render_outcome(orchestrator.run_by_pattern(pattern).await?))
        }

        Command::RunFailed => Ok(render_outcome(orchestrator.run_failed().await?)),

        Command::RunLast => Ok(render_outcome(orchestrator.run_last_set().await?)),

        Command::List => {
            let tests = orchestrator.discover().await?.to_vec();
            for test in &tests {
                println!("{}  ({})", test.full_name, test.file.display());
            }
            println!("{} test(s) discovered", tests.len());
            Ok(0)
        }
    }
}

/// Render a run outcome to stdout and map it to an exit code.
///
/// Informational outcomes are notices, never error indicators.
fn render_outcome(outcome: RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Completed(result) => {
            let failed = result.failed.len();
            if failed == 0 {
                println!("All tests passed.");
                0
            } else {
                println!(
                    "There are {failed} failed test{}:",
                    if failed > 1 { "s" } else { "" }
                );
                for test in &result.failed {
                    println!("  {}", test.full_name);
                }
                failed as i32
            }
        }
        RunOutcome::NoTestsFound => {
            println!("No tests were found.");
            0
        }
        RunOutcome::NothingToRerun => {
            println!("Nothing to re-run.");
            0
        }
    }
}
