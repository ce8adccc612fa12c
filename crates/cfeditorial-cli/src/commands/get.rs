//! Module for running the editorial pipeline from the command line.

use super::*;

/// Options for [`Commands::Get`].
#[derive(Args, Clone)]
pub struct GetOptions {
  /// Codeforces problem URL
  /// Example: "https://codeforces.com/contest/1/problem/A"
  pub url: String,

  /// Recompute even when a cached result exists
  #[arg(long)]
  pub no_cache: bool,

  /// Print machine-readable JSON instead of formatted text
  #[arg(long)]
  pub json: bool,

  /// Also print the problem's metadata
  #[arg(long)]
  pub details: bool,
}

/// Function for the [`Commands::Get`] in the CLI.
pub async fn get(config: &Config, options: &GetOptions) -> Result<()> {
  let orchestrator = Orchestrator::from_config(config).await?;

  if !options.json {
    println!(
      "{} Looking for the editorial of {}",
      style(INFO_PREFIX).cyan(),
      style(&options.url).yellow()
    );
  }
  let (metadata, result) = if options.details {
    let (problem, result) = orchestrator.process_with_problem(&options.url, !options.no_cache).await?;
    (Some(problem), result)
  } else {
    (None, orchestrator.process(&options.url, !options.no_cache).await?)
  };

  if options.json {
    let output = match metadata {
      Some(problem) => serde_json::json!({ "problem": problem, "editorial": result }),
      None => serde_json::to_value(&result)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    return Ok(());
  }

  if let Some(problem) = &metadata {
    print_problem(problem);
  }
  print_editorial(&result);
  Ok(())
}

/// Prints one labelled line when the value is present.
fn field(label: &str, value: Option<&str>) {
  if let Some(value) = value {
    println!("   {} {}", style(format!("{label}:")).green().bold(), value);
  }
}

/// Formatted problem metadata.
fn print_problem(problem: &ProblemMetadata) {
  println!("\n{} Problem {}", style(SUCCESS_PREFIX).green(), style(&problem.identifier).bold());
  field("Title", Some(problem.title.as_str()));
  field("Contest", problem.contest_name.as_deref());
  field("Time limit", problem.time_limit.as_deref());
  field("Memory limit", problem.memory_limit.as_deref());
  if !problem.tags.is_empty() {
    field("Tags", Some(problem.tags.join(", ").as_str()));
  }
  println!("   {} {}", style("URL:").green().bold(), style(&problem.url).blue().underlined());
  for link in &problem.editorial_links {
    println!(
      "   {} {} {}",
      style("Material:").green().bold(),
      link.title,
      style(&link.url).blue().underlined()
    );
  }
}

/// Formatted extraction result.
fn print_editorial(result: &EditorialResult) {
  println!(
    "\n{} Editorial for problem {}",
    style(SUCCESS_PREFIX).green(),
    style(&result.problem_id).bold()
  );
  println!(
    "   {} {}",
    style("Source:").green().bold(),
    style(&result.source_url).blue().underlined()
  );
  field("Algorithm", result.algorithm.as_deref());
  field("Time", result.time_complexity.as_deref());
  field("Space", result.space_complexity.as_deref());
  field("Approach", result.approach.as_deref());

  println!("\n{}\n", result.solution_text.trim());

  if !result.hints.is_empty() {
    println!("{}", style("Hints").green().bold());
    for (i, hint) in result.hints.iter().enumerate() {
      let branch = if i + 1 == result.hints.len() { TREE_LEAF } else { TREE_BRANCH };
      println!("{branch} {hint}");
    }
    println!();
  }

  for snippet in &result.code_snippets {
    let heading = match &snippet.description {
      Some(description) => format!("{} ({description})", snippet.language),
      None => snippet.language.clone(),
    };
    println!("{}", style(heading).green().bold());
    println!("{}\n", snippet.code.trim_end());
  }

  if let Some(notes) = &result.notes {
    println!("{} {}", style(WARNING_PREFIX).yellow(), notes);
  }
  let extracted = result.extracted_at.format("%Y-%m-%d %H:%M UTC");
  println!("{}", style(format!("Extracted {extracted} by {}", result.ai_model)).dim());
}
