//! Foreground scheduler daemon.

use tracing_subscriber::EnvFilter;

use super::*;

/// Function for [`Commands::Serve`] in the CLI.
///
/// Installs the daemon logging subscriber, assembles the pipeline, and runs
/// the scheduler loop until no schedule remains enabled or the process is
/// terminated.
pub async fn serve(cli: &Cli, log_dir: Option<PathBuf>) -> Result<()> {
  // The non-blocking writer stops logging once its guard drops, so the guard
  // must live for the whole loop.
  let _guard = setup_daemon_logging(cli.verbose, log_dir)?;

  let config = Config::from_path(cli.config_path())?;
  let pipeline = Pipeline::from_config(&config, false)?;
  let mut scheduler = Scheduler::from_config(&config, pipeline)?;

  println!("{} Scheduler running; press Ctrl-C to stop", style(INFO_PREFIX).cyan());
  scheduler.run_forever().await;
  println!("{} Scheduler stopped", style(SUCCESS_PREFIX).green());
  Ok(())
}

/// Configures daemon logging, optionally into daily-rotating files.
fn setup_daemon_logging(
  verbosity: u8,
  log_dir: Option<PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
  let filter = match verbosity {
    0 => "info",
    1 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  match log_dir {
    Some(dir) => {
      std::fs::create_dir_all(&dir)?;
      let appender = tracing_appender::rolling::daily(dir, "scout.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
      Ok(Some(guard))
    },
    None => {
      tracing_subscriber::fmt().with_env_filter(filter).init();
      Ok(None)
    },
  }
}
