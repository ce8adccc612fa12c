//! Offline inspection of a problem URL.

use super::*;

/// Function for the [`Commands::Resolve`] in the CLI.
pub fn resolve(config: &Config, url: &str) -> Result<()> {
  let identifier = ProblemIdentifier::resolve(url)?;
  trace!("Resolved {url} to {identifier:?}");

  println!("{} {}", style(SUCCESS_PREFIX).green(), style(identifier.to_string()).bold());
  println!("   {} {}", style("Contest:").green().bold(), identifier.contest_id);
  println!("   {} {}", style("Problem:").green().bold(), identifier.problem_id);
  println!("   {} {}", style("Gym:").green().bold(), if identifier.is_gym { "yes" } else { "no" });
  println!(
    "   {} {}",
    style("Problem page:").green().bold(),
    style(identifier.problem_url()).blue().underlined()
  );
  println!(
    "   {} {}",
    style("Contest page:").green().bold(),
    style(identifier.contest_url()).blue().underlined()
  );
  println!(
    "   {} {}",
    style("Cache key:").green().bold(),
    identifier.cache_key_with(&config.cache.key_prefix)
  );
  Ok(())
}
