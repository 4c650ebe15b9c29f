// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `goalweaver`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "goalweaver",
    version,
    about = "Run a team of agents over a self-extending goal graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Goalweaver.toml` is used when it exists; otherwise the
    /// built-in research demo is seeded.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Override `[orchestrator].state_path`.
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<String>,

    /// Override `[orchestrator].batch_size`.
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GOALWEAVER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Seed and print the goal graph, but don't dispatch anything.
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
