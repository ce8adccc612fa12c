//! Error types for the cfeditorial library.
//!
//! Every failure the pipeline can surface carries a distinguishing kind, so callers can tell a
//! malformed input apart from a missing editorial or an unavailable model:
//! - Input validation ([`EditorialError::UrlParse`])
//! - Upstream lookups ([`EditorialError::ProblemNotFound`], [`EditorialError::EditorialNotFound`])
//! - Capabilities ([`EditorialError::Network`], [`EditorialError::OpenAi`],
//!   [`EditorialError::Cache`])
//! - Content decoding ([`EditorialError::Parsing`], [`EditorialError::Extraction`])
//!
//! # Examples
//!
//! ```
//! use cfeditorial::{error::EditorialError, identifier::ProblemIdentifier};
//!
//! match ProblemIdentifier::resolve("https://codeforces.com/blog/entry/123") {
//!   Err(EditorialError::UrlParse(msg)) => println!("bad input: {msg}"),
//!   Err(e) => println!("other error: {e}"),
//!   Ok(id) => println!("resolved {id}"),
//! }
//! ```

use thiserror::Error;

/// Error type alias used for the [`cfeditorial`](crate) crate.
pub type Result<T> = core::result::Result<T, EditorialError>;

/// Errors that can occur while locating and extracting an editorial.
///
/// Variants that wrap a plain message carry the offending URL or identifier so the error is
/// actionable on its own.
#[derive(Error, Debug)]
pub enum EditorialError {
  /// The input is not a recognised Codeforces problem URL.
  ///
  /// This occurs when:
  /// - The path matches none of the supported problem shapes
  /// - The contest id is not numeric
  /// - The problem letter is missing or malformed
  #[error("Invalid Codeforces problem URL: {0}")]
  UrlParse(String),

  /// The problem page answered with a missing-resource status.
  #[error("Problem not found: {0}")]
  ProblemNotFound(String),

  /// Discovery exhausted every candidate without producing a result.
  #[error("No editorial found for problem {0}")]
  EditorialNotFound(String),

  /// The language model was unavailable, timed out, or kept returning malformed output.
  #[error("Language model error: {0}")]
  OpenAi(String),

  /// The model answered, but not with a JSON object.
  ///
  /// Callers that can ask again with a stricter prompt treat this as a malformed answer rather
  /// than an unavailable model.
  #[error("Malformed completion: {0}")]
  MalformedCompletion(String),

  /// A transport failure that outlived the fetcher's own retry budget.
  #[error("Network error: {0}")]
  Network(String),

  /// The cache backend failed an I/O operation.
  ///
  /// The orchestrator never lets this abort a request: read failures degrade to a miss and
  /// write failures are logged.
  #[error("Cache error: {0}")]
  Cache(String),

  /// A page or tutorial could not be decoded, or expected structural markers were absent.
  #[error("Parsing error: {0}")]
  Parsing(String),

  /// The model reported that the requested problem is not covered by the document.
  #[error("Extraction error: {0}")]
  Extraction(String),

  /// The configuration is incomplete or inconsistent.
  #[error("Configuration error: {0}")]
  Config(String),

  /// A file system operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// A TOML configuration document could not be deserialized.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// A TOML configuration document could not be serialized.
  #[error(transparent)]
  TomlSer(#[from] toml::ser::Error),

  /// JSON (de)serialization failed.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// PDF parsing and text extraction errors from the lopdf library.
  ///
  /// Common causes are malformed or encrypted files and unsupported stream encodings.
  #[error(transparent)]
  Lopdf(#[from] lopdf::Error),
}

impl EditorialError {
  /// Stable, language-neutral name of the error kind.
  pub fn error_type(&self) -> &'static str {
    match self {
      Self::UrlParse(_) => "URLParseError",
      Self::ProblemNotFound(_) => "ProblemNotFoundError",
      Self::EditorialNotFound(_) => "EditorialNotFoundError",
      Self::OpenAi(_) | Self::MalformedCompletion(_) => "OpenAIAPIError",
      Self::Network(_) => "NetworkError",
      Self::Cache(_) => "CacheError",
      Self::Parsing(_) | Self::Lopdf(_) => "ParsingError",
      Self::Extraction(_) => "ExtractionError",
      Self::Config(_) | Self::TomlDe(_) | Self::TomlSer(_) => "ConfigurationError",
      Self::Io(_) | Self::Json(_) => "InternalError",
    }
  }

  /// Whether this error only disqualifies the current tutorial candidate.
  ///
  /// A candidate that cannot be fetched, decoded, or that does not cover the problem is skipped
  /// in favour of the next one.
  pub fn is_candidate_failure(&self) -> bool {
    matches!(
      self,
      Self::Network(_)
        | Self::ProblemNotFound(_)
        | Self::Parsing(_)
        | Self::Lopdf(_)
        | Self::Extraction(_)
        | Self::OpenAi(_)
        | Self::MalformedCompletion(_)
    )
  }
}

impl From<rusqlite::Error> for EditorialError {
  fn from(e: rusqlite::Error) -> Self { Self::Cache(e.to_string()) }
}

impl From<tokio_rusqlite::Error> for EditorialError {
  fn from(e: tokio_rusqlite::Error) -> Self { Self::Cache(e.to_string()) }
}

impl From<redis::RedisError> for EditorialError {
  fn from(e: redis::RedisError) -> Self { Self::Cache(e.to_string()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_type_names() {
    assert_eq!(EditorialError::UrlParse("x".into()).error_type(), "URLParseError");
    assert_eq!(EditorialError::EditorialNotFound("1/A".into()).error_type(), "EditorialNotFoundError");
    assert_eq!(EditorialError::OpenAi("down".into()).error_type(), "OpenAIAPIError");
    assert_eq!(EditorialError::MalformedCompletion("prose".into()).error_type(), "OpenAIAPIError");
    assert_eq!(EditorialError::Cache("io".into()).error_type(), "CacheError");
  }

  #[test]
  fn test_candidate_failures() {
    assert!(EditorialError::Parsing("empty".into()).is_candidate_failure());
    assert!(EditorialError::Extraction("absent".into()).is_candidate_failure());
    assert!(!EditorialError::UrlParse("bad".into()).is_candidate_failure());
    assert!(!EditorialError::Cache("io".into()).is_candidate_failure());
  }
}
