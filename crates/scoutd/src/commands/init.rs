//! Configuration scaffolding.

use super::*;

/// Function for [`Commands::Init`] in the CLI.
///
/// Writes the default configuration to the resolved path, creating parent
/// directories as needed. Refuses to overwrite an existing file unless
/// `--force` is given.
pub fn init(cli: &Cli, force: bool) -> Result<()> {
  let path = cli.config_path();

  if path.exists() && !force {
    println!(
      "{} Configuration already exists at {}; pass --force to overwrite",
      style(WARNING_PREFIX).yellow(),
      path.display(),
    );
    return Ok(());
  }

  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  Config::write_default(&path)?;

  println!(
    "{} Configuration initialized at {}",
    style(SUCCESS_PREFIX).green(),
    path.display(),
  );
  println!(
    "{} Edit the [research] section to match your interests, then try `scout check`",
    style(INFO_PREFIX).cyan(),
  );
  Ok(())
}
