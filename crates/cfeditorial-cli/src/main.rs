//! Command line front end for the `cfeditorial` editorial finder.
//!
//! # Usage
//!
//! ```bash
//! # Write a default configuration file
//! cfeditorial init
//!
//! # Find and summarize the editorial for a problem
//! cfeditorial get https://codeforces.com/contest/1/problem/A
//!
//! # Same, as JSON and including the problem statement metadata
//! cfeditorial get https://codeforces.com/contest/1/problem/A --json --details
//!
//! # Show how a URL is understood, without touching the network
//! cfeditorial resolve https://codeforces.com/gym/102942/problem/F
//!
//! # Drop one cached editorial, or all of them
//! cfeditorial invalidate https://codeforces.com/contest/1/problem/A
//! cfeditorial clear
//! ```
//!
//! Failures are reported with their error kind and a non-zero exit code. Logging verbosity is
//! raised with `-v` and can be overridden with `RUST_LOG`.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use cfeditorial::{
  cache::ResultCache,
  config::{Config, LoggingConfig, DEFAULT_CONFIG},
  editorial::EditorialResult,
  error::EditorialError,
  identifier::ProblemIdentifier,
  orchestrator::Orchestrator,
  problem::ProblemMetadata,
};
use clap::{builder::ArgAction, Args, Parser, Subcommand};
use console::style;
use tracing::{debug, trace};
use tracing_appender::{
  non_blocking::WorkerGuard,
  rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod error;

use crate::{commands::*, error::*};

/// Prefix for information messages
static INFO_PREFIX: &str = "ℹ ";
/// Prefix for success messages
static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for warning messages
static WARNING_PREFIX: &str = "⚠️ ";
/// Prefix for error messages
static ERROR_PREFIX: &str = "✗ ";
/// Branch character for nested output
static TREE_BRANCH: &str = "├";
/// Leaf character for nested output
static TREE_LEAF: &str = "└";

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Find and summarize Codeforces problem editorials")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Path to the configuration file. If not specified, uses the default platform-specific
  /// configuration directory.
  #[arg(long, short, global = true)]
  config: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,

  /// Skip all prompts and accept defaults
  #[arg(long, short = 'y', global = true)]
  accept_defaults: bool,
}

impl Cli {
  /// The configuration file this invocation reads or writes.
  fn config_path(&self) -> PathBuf { self.config.clone().unwrap_or_else(Config::default_path) }
}

/// Configures the logging system based on the verbosity level
///
/// The verbosity levels are:
/// - 0: error, or the configured level when logging to a file
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
///
/// When the configuration names a log file, events go to that file instead of stderr. The
/// returned guard flushes the file writer and must live until the process exits.
fn setup_logging(verbosity: u8, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
  let filter = match verbosity {
    0 if logging.file.is_some() => logging.level.as_str(),
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  let subscriber = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true);

  let Some(path) = &logging.file else {
    subscriber.with_writer(std::io::stderr).init();
    return Ok(None);
  };

  let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  let file_name = path
    .file_name()
    .and_then(|name| name.to_str())
    .ok_or_else(|| CliError::Logging(format!("not a file path: {}", path.display())))?;
  let appender = RollingFileAppender::builder()
    .rotation(Rotation::NEVER)
    .filename_prefix(file_name)
    .build(directory)
    .map_err(|e| CliError::Logging(format!("{}: {e}", path.display())))?;
  let (writer, guard) = tracing_appender::non_blocking(appender);
  subscriber.with_writer(writer).with_ansi(false).init();
  Ok(Some(guard))
}

/// Loads configuration, sets up logging and dispatches the requested command.
async fn run(cli: &Cli) -> Result<()> {
  if let Err(e) = dotenvy::dotenv() {
    if !e.not_found() {
      return Err(CliError::Dotenv(e));
    }
  }

  let config_path = cli.config_path();
  // `init` replaces the file, so it must not fail on a broken one.
  let config = match cli.command {
    Commands::Init => Config::default(),
    _ => Config::load(&config_path)?,
  };
  let _guard = setup_logging(cli.verbose, &config.logging)?;
  debug!(path = %config_path.display(), "Configuration ready");

  match &cli.command {
    Commands::Init => init(cli, &config_path),
    Commands::Get(options) => get(&config, options).await,
    Commands::Resolve { url } => resolve(&config, url),
    Commands::Invalidate { url } => invalidate(&config, url).await,
    Commands::Clear => clear(cli, &config).await,
  }
}

/// Entry point for the `cfeditorial` CLI application
///
/// Exits with status 1 after printing the error kind and message when the command fails.
#[tokio::main]
async fn main() {
  let cli = Cli::parse();
  if let Err(error) = run(&cli).await {
    trace!("Command failed: {error:?}");
    eprintln!("{} {}: {}", style(ERROR_PREFIX).red(), style(error.error_type()).red().bold(), error);
    std::process::exit(1);
  }
}
