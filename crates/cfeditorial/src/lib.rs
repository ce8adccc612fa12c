//! Library for locating Codeforces editorials and extracting the solution to a single problem.
//!
//! Given the URL of a Codeforces problem, `cfeditorial` discovers the tutorial published for the
//! problem's contest, turns the tutorial (HTML page or PDF attachment) into plain text, and asks a
//! language model to pull out the part of that text that solves the requested problem. Results
//! are cached so repeated lookups are served without touching the network.
//!
//! The pipeline is composed of independent stages, each behind a trait so that tests and
//! embedders can swap in their own implementation:
//!
//! - [`identifier`]: turns a URL into a [`ProblemIdentifier`](identifier::ProblemIdentifier)
//! - [`problem`]: fetches problem metadata ([`FetchMetadata`](problem::FetchMetadata))
//! - [`locator`]: ranks tutorial candidates ([`LocateTutorials`](locator::LocateTutorials))
//! - [`document`]: turns a candidate into text ([`ExtractDocument`](document::ExtractDocument))
//! - [`extractor`]: asks the model for the solution ([`ExtractSolution`](extractor::ExtractSolution))
//! - [`cache`]: stores finished results ([`CacheStore`](cache::CacheStore))
//!
//! The [`orchestrator::Orchestrator`] wires the stages together.
//!
//! # Getting Started
//!
//! ```no_run
//! use cfeditorial::{config::Config, orchestrator::Orchestrator, prelude::*};
//!
//! # async fn run() -> Result<(), EditorialError> {
//! let config = Config::load(Config::default_path())?;
//! let orchestrator = Orchestrator::from_config(&config).await?;
//!
//! let url = "https://codeforces.com/contest/1/problem/A";
//! let (metadata, result) = orchestrator.process_with_problem(url, true).await?;
//! println!("{}: {}", metadata.title, result.solution_text);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//!
//! - Capabilities (HTTP, language model, cache backend) are injected as trait objects and never
//!   held as process-wide globals.
//! - Only results that passed extraction are ever written to the cache.
//! - Failure of one tutorial candidate never aborts the request while other candidates remain.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::HashMap,
  fmt::Display,
  path::{Path, PathBuf},
  str::FromStr,
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod cache;
pub mod config;
pub mod document;
pub mod editorial;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod identifier;
pub mod llm;
pub mod locator;
pub mod lock;
pub mod orchestrator;
pub mod pdf;
pub mod problem;
pub mod prompts;

use crate::{
  cache::*, config::*, document::*, editorial::*, error::*, extractor::*, fetch::*, identifier::*,
  llm::*, locator::*, lock::*, problem::*,
};

/// Common traits and types for ergonomic imports.
///
/// ```no_run
/// use cfeditorial::{identifier::ProblemIdentifier, prelude::*};
///
/// fn example() -> Result<(), EditorialError> {
///   let id = ProblemIdentifier::resolve("https://codeforces.com/problemset/problem/1/A")?;
///   println!("{}", id.cache_key());
///   Ok(())
/// }
/// ```
///
/// Currently exports:
/// - The stage traits ([`FetchMetadata`], [`LocateTutorials`], [`ExtractDocument`],
///   [`ExtractSolution`])
/// - The capability traits ([`WebFetch`], [`Completion`], [`CacheStore`])
/// - [`EditorialError`]: Core error type for the library
pub mod prelude {
  pub use crate::{
    cache::CacheStore, document::ExtractDocument, error::EditorialError,
    extractor::ExtractSolution, fetch::WebFetch, llm::Completion, locator::LocateTutorials,
    problem::FetchMetadata,
  };
}
