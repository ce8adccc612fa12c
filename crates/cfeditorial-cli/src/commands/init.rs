//! Module for setting up a `cfeditorial` configuration.

use super::*;

/// Function for the [`Commands::Init`] in the CLI.
///
/// Writes the commented default configuration to the selected path, asking before replacing an
/// existing file.
pub fn init(cli: &Cli, path: &Path) -> Result<()> {
  if path.exists()
    && !cli.accept_defaults
    && !dialoguer::Confirm::new()
      .with_prompt(format!("A configuration already exists at {}. Overwrite it?", path.display()))
      .default(false)
      .interact()?
  {
    println!(
      "{} Keeping the existing configuration. Pass --config to write somewhere else",
      style(INFO_PREFIX).cyan()
    );
    return Ok(());
  }

  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, DEFAULT_CONFIG)?;
  println!(
    "{} Wrote default configuration to {}",
    style(SUCCESS_PREFIX).green(),
    style(path.display()).yellow()
  );
  println!(
    "{} Set OPENAI_API_KEY (or openai.api_key in the file) before running `cfeditorial get`",
    style(INFO_PREFIX).cyan()
  );
  Ok(())
}
