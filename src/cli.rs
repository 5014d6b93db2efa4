// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for the `taskmaster` orchestrator.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskmaster",
    version,
    about = "Supervise a fleet of cooperating processes with declared start-up dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Taskmaster.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Taskmaster.toml")]
    pub config: String,

    /// Override the reconciliation tick interval (e.g. "3s", "500ms").
    #[arg(long, value_name = "DURATION")]
    pub tick_interval: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKMASTER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task table, but don't launch anything.
    #[arg(long)]
    pub dry_run: bool,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
