use clap::ValueEnum;

use super::*;

pub mod check;
pub mod init;
pub mod run;
pub mod serve;

pub use check::check;
pub use init::init;
pub use run::run;
pub use serve::serve;

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Write a default configuration file
  Init {
    /// Overwrite an existing configuration file
    #[arg(long)]
    force: bool,
  },

  /// Validate the configuration and show what a run would use
  Check,

  /// Produce one digest immediately
  Run {
    /// Which digest window to produce
    #[arg(value_enum, default_value = "manual")]
    kind: RunKind,

    /// Render the digest but skip all delivery
    #[arg(long)]
    dry_run: bool,
  },

  /// Run the scheduler in the foreground
  Serve {
    /// Directory for rotating log files; console-only logging when omitted
    #[arg(long)]
    log_dir: Option<PathBuf>,
  },
}

/// Digest window selectable on the command line.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RunKind {
  /// One-day window, recorded as a manual run
  Manual,
  /// One-day window on the daily schedule's behalf
  Daily,
  /// Seven-day window on the weekly schedule's behalf
  Weekly,
}

impl From<RunKind> for DigestKind {
  fn from(kind: RunKind) -> Self {
    match kind {
      RunKind::Manual => DigestKind::Manual,
      RunKind::Daily => DigestKind::Daily,
      RunKind::Weekly => DigestKind::Weekly,
    }
  }
}
