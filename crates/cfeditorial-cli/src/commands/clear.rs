//! Module for the "clear" functionality of the editorial cache.

use super::*;

/// Function for the [`Commands::Clear`] in the CLI.
pub async fn clear(cli: &Cli, config: &Config) -> Result<()> {
  let cache = ResultCache::from_config(&config.cache).await?;
  println!(
    "{} Clearing the {} cache ({})",
    style(WARNING_PREFIX).yellow(),
    style(config.cache.backend).yellow(),
    config.cache.location()
  );

  if !cli.accept_defaults
    && !dialoguer::Confirm::new()
      .with_prompt("Are you sure you want to delete every cached editorial?")
      .default(false)
      .wait_for_newline(true)
      .interact()?
  {
    println!("{} Operation cancelled", style(ERROR_PREFIX).red());
    return Ok(());
  }

  let removed = cache.clear().await?;
  println!("{} Cleared {removed} cached editorial(s)", style(SUCCESS_PREFIX).green());
  Ok(())
}
