//! Error types for the `cfeditorial` command line.

use thiserror::Error;

use super::*;

/// Error type alias used throughout the CLI.
pub type Result<T> = core::result::Result<T, CliError>;

/// Errors a CLI command can end with.
#[derive(Error, Debug)]
pub enum CliError {
  /// The editorial pipeline or one of its components failed.
  #[error(transparent)]
  Editorial(#[from] EditorialError),

  /// Reading or writing a local file failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// An interactive prompt could not be shown or answered.
  #[error(transparent)]
  Dialoguer(#[from] dialoguer::Error),

  /// A result could not be rendered as JSON.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A `.env` file exists but could not be read.
  #[error("Failed to load .env file: {0}")]
  Dotenv(dotenvy::Error),

  /// The configured log file could not be opened.
  #[error("Failed to set up logging: {0}")]
  Logging(String),
}

impl CliError {
  /// Stable name of the error kind, as reported on stderr.
  pub fn error_type(&self) -> &'static str {
    match self {
      Self::Editorial(e) => e.error_type(),
      Self::Dotenv(_) | Self::Logging(_) => "ConfigurationError",
      Self::Dialoguer(_) => "InteractionError",
      Self::Io(_) | Self::Json(_) => "InternalError",
    }
  }
}
