//! Module for the "invalidate" functionality of the editorial cache.

use super::*;

/// Function for the [`Commands::Invalidate`] in the CLI.
///
/// Only the cache is opened, so no model credentials are needed.
pub async fn invalidate(config: &Config, url: &str) -> Result<()> {
  let identifier = ProblemIdentifier::resolve(url)?;
  let cache = ResultCache::from_config(&config.cache).await?;
  if cache.invalidate(&identifier).await? {
    println!(
      "{} Removed cached editorial for {}",
      style(SUCCESS_PREFIX).green(),
      style(&identifier).yellow()
    );
  } else {
    println!("{} No cached editorial for {}", style(INFO_PREFIX).cyan(), style(&identifier).yellow());
  }
  Ok(())
}
