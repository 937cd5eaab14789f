//! Configuration validation.

use super::*;

/// Function for [`Commands::Check`] in the CLI.
///
/// Loads and validates the configuration, then prints the effective settings
/// a run would use. Makes no network calls.
pub fn check(cli: &Cli) -> Result<()> {
  let path = cli.config_path();
  let config = match Config::from_path(&path) {
    Ok(config) => config,
    Err(e) => {
      println!(
        "{} Configuration at {} is invalid: {}",
        style(ERROR_PREFIX).red(),
        path.display(),
        style(&e).red(),
      );
      return Err(e.into());
    },
  };

  println!("{} Configuration at {} is valid", style(SUCCESS_PREFIX).green(), path.display());
  println!("  categories:       {}", config.research.categories.join(", "));
  println!("  keywords:         {}", config.research.keywords.join(", "));
  println!("  analysis budget:  {} papers per run", config.research.analysis_budget);
  println!(
    "  thresholds:       relevance {:.2}, significance {:.2}",
    config.research.min_relevance, config.research.min_significance,
  );
  println!("  model:            {} at {}", config.llm.model, config.llm.host);
  println!("  output directory: {}", config.output.directory.display());

  if config.schedule.daily_enabled {
    println!("  daily digest:     {} UTC", config.schedule.daily_time);
  }
  if config.schedule.weekly_enabled {
    println!(
      "  weekly digest:    {} {} UTC",
      config.schedule.weekly_day, config.schedule.weekly_time,
    );
  }
  if config.delivery.webhook_url.is_some() {
    println!("  delivery:         webhook configured");
  }
  if config.delivery.email.enabled {
    println!("  delivery:         email to {} recipients", config.delivery.email.recipients.len());
  }

  Ok(())
}
