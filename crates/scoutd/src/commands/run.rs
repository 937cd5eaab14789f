//! One-shot digest runs.

use scout::pipeline::RunStatus;

use super::*;

/// Function for [`Commands::Run`] in the CLI.
///
/// Executes one complete pipeline pass and reports the outcome. A failed run
/// maps to a non-zero exit code; a partial run succeeds but lists its
/// warnings.
pub async fn run(cli: &Cli, kind: RunKind, dry_run: bool) -> Result<()> {
  let config = Config::from_path(cli.config_path())?;
  tracing::debug!("loaded configuration from {}", cli.config_path().display());
  let pipeline = Pipeline::from_config(&config, dry_run)?;

  let kind = DigestKind::from(kind);
  println!("{} Starting {kind} digest run...", style(INFO_PREFIX).cyan());
  let result = pipeline.execute(kind).await;

  for warning in &result.warnings {
    println!(
      "{} {:?} warning for {}: {}",
      style(WARNING_PREFIX).yellow(),
      warning.kind,
      warning.subject,
      warning.reason,
    );
  }

  match result.status {
    RunStatus::Success | RunStatus::Partial => {
      let note = if dry_run { " (dry run, nothing delivered)" } else { "" };
      println!("{} Digest run finished{note}", style(SUCCESS_PREFIX).green());
      for file in &result.digest_files {
        println!("  {file}");
      }
      Ok(())
    },
    RunStatus::Failed => {
      let reason = result.error.unwrap_or_else(|| "unknown".to_string());
      println!("{} Digest run failed: {}", style(ERROR_PREFIX).red(), style(&reason).red());
      Err(ScoutdError::RunFailed(reason))
    },
  }
}
