//! Command line interface and daemon for the scout research digest pipeline.
//!
//! This crate provides a CLI tool over the `scout` library. It supports:
//! - One-shot digest runs (with a dry-run mode that skips delivery)
//! - A foreground daemon driving the daily and weekly schedules
//! - Configuration scaffolding and validation
//!
//! # Usage
//!
//! ```bash
//! # Write a commented default configuration
//! scout init
//!
//! # Validate the configuration and show what a run would do
//! scout check
//!
//! # Produce one digest immediately, without delivering it
//! scout run --dry-run
//!
//! # Run the scheduler in the foreground
//! scout serve
//! ```
//!
//! The `-v` flag raises logging verbosity; `serve` additionally writes
//! rotating log files.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use clap::{builder::ArgAction, Parser, Subcommand};
use console::style;
use scout::{config::Config, digest::DigestKind, pipeline::Pipeline, scheduler::Scheduler};
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod error;

use crate::{commands::*, error::*};

/// Prefix for information messages
static INFO_PREFIX: &str = "ℹ ";
/// Prefix for success messages
static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for warning messages
static WARNING_PREFIX: &str = "⚠️ ";
/// Prefix for error messages
static ERROR_PREFIX: &str = "✗ ";

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Daemon and CLI for the scout research digest pipeline")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Path to the configuration file. If not specified, uses the default
  /// platform-specific config directory.
  #[arg(long, short, global = true)]
  config: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,
}

impl Cli {
  /// The configuration file path to use.
  fn config_path(&self) -> PathBuf { self.config.clone().unwrap_or_else(Config::default_path) }
}

/// Configures the logging system based on the verbosity level
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
fn setup_logging(verbosity: u8) {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_file(true)
    .with_line_number(true)
    .with_target(true)
    .init();
}

/// Entry point for the scout CLI application
///
/// Handles command line argument parsing, sets up logging, and executes the
/// requested command. `serve` installs its own file-logging subscriber, so
/// the console subscriber is skipped for it.
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let command = cli.command.clone();

  if !matches!(command, Commands::Serve { .. }) {
    setup_logging(cli.verbose);
  }

  match command {
    Commands::Init { force } => init(&cli, force),
    Commands::Check => check(&cli),
    Commands::Run { kind, dry_run } => run(&cli, kind, dry_run).await,
    Commands::Serve { log_dir } => serve(&cli, log_dir).await,
  }
}
