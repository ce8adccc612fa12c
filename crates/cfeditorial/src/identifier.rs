//! Resolution of Codeforces problem URLs into canonical identifiers.
//!
//! Supported shapes, on `codeforces.com` or `codeforces.ru` (optionally behind `www.` or one of
//! the `m1`..`m3` mirrors):
//!
//! - `/contest/{contest_id}/problem/{problem_id}`
//! - `/problemset/problem/{contest_id}/{problem_id}`
//! - `/gym/{contest_id}/problem/{problem_id}`
//!
//! # Examples
//!
//! ```
//! use cfeditorial::identifier::ProblemIdentifier;
//!
//! let id = ProblemIdentifier::resolve("https://codeforces.ru/contest/1234/problem/a").unwrap();
//! assert_eq!(id.contest_id, "1234");
//! assert_eq!(id.problem_id, "A");
//! assert_eq!(id.cache_key(), "editorial_1234_A");
//! ```

use super::*;

lazy_static! {
  static ref HOST: Regex = Regex::new(r"^(?:(?:www|m[1-3])\.)?codeforces\.(?:com|ru)$").unwrap();
  static ref CONTEST_ID: Regex = Regex::new(r"^[0-9]+$").unwrap();
  static ref PROBLEM_ID: Regex = Regex::new(r"^[A-Z][0-9]?$").unwrap();
}

/// Canonical name of a Codeforces problem.
///
/// Immutable and derived purely from URL text: `problem_id` always matches `[A-Z][0-9]?` and
/// `contest_id` is always numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemIdentifier {
  /// Numeric contest (or gym) id.
  pub contest_id: String,
  /// Upper-case problem letter, optionally followed by one digit.
  pub problem_id: String,
  /// Whether the problem belongs to a gym contest.
  pub is_gym:     bool,
}

impl ProblemIdentifier {
  /// Builds an identifier from its parts, validating both ids.
  pub fn new(contest_id: &str, problem_id: &str, is_gym: bool) -> Result<Self> {
    let contest_id = contest_id.trim();
    let problem_id = problem_id.trim().to_uppercase();
    if problem_id.is_empty() {
      return Err(EditorialError::UrlParse("missing problem id".into()));
    }
    if !CONTEST_ID.is_match(contest_id) {
      return Err(EditorialError::UrlParse(format!("contest id '{contest_id}' is not numeric")));
    }
    if !PROBLEM_ID.is_match(&problem_id) {
      return Err(EditorialError::UrlParse(format!("malformed problem id '{problem_id}'")));
    }
    Ok(Self { contest_id: contest_id.to_string(), problem_id, is_gym })
  }

  /// Parses a problem URL.
  ///
  /// The scheme may be omitted. Host names are compared case-insensitively; repeated and
  /// trailing slashes, query strings and fragments are ignored.
  ///
  /// # Errors
  ///
  /// Returns [`EditorialError::UrlParse`] when the input is not a Codeforces URL, when the path
  /// matches none of the supported shapes, or when either id is malformed.
  pub fn resolve(url: &str) -> Result<Self> {
    let input = url.trim();
    let with_scheme =
      if input.contains("://") { input.to_string() } else { format!("https://{input}") };
    let parsed = Url::parse(&with_scheme)
      .map_err(|e| EditorialError::UrlParse(format!("{input}: {e}")))?;

    match parsed.host_str() {
      Some(host) if HOST.is_match(&host.to_lowercase()) => {},
      _ => return Err(EditorialError::UrlParse(format!("{input}: not a Codeforces URL"))),
    }

    let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();
    let lowered: Vec<String> = segments.iter().map(|s| s.to_lowercase()).collect();
    let shape: Vec<&str> = lowered.iter().map(String::as_str).collect();

    let identifier = match shape.as_slice() {
      ["contest", _, "problem", _] => Self::new(segments[1], segments[3], false),
      ["problemset", "problem", _, _] => Self::new(segments[2], segments[3], false),
      ["gym", _, "problem", _] => Self::new(segments[1], segments[3], true),
      _ =>
        return Err(EditorialError::UrlParse(format!(
          "{input}: expected /contest/<id>/problem/<p>, /problemset/problem/<id>/<p> or \
           /gym/<id>/problem/<p>"
        ))),
    }
    .map_err(|e| match e {
      EditorialError::UrlParse(msg) => EditorialError::UrlParse(format!("{input}: {msg}")),
      other => other,
    })?;

    trace!("Resolved {input} to {identifier}");
    Ok(identifier)
  }

  /// Contest and problem ids concatenated, e.g. `1234A`.
  pub fn full_id(&self) -> String { format!("{}{}", self.contest_id, self.problem_id) }

  /// Key under which the extracted result is cached.
  pub fn cache_key(&self) -> String { self.cache_key_with("editorial_") }

  /// Cache key under a custom prefix.
  pub fn cache_key_with(&self, prefix: &str) -> String {
    let gym = if self.is_gym { "gym_" } else { "" };
    format!("{prefix}{gym}{}_{}", self.contest_id, self.problem_id)
  }

  /// Canonical URL of the problem statement.
  pub fn problem_url(&self) -> String {
    if self.is_gym {
      format!("https://codeforces.com/gym/{}/problem/{}", self.contest_id, self.problem_id)
    } else {
      format!("https://codeforces.com/problemset/problem/{}/{}", self.contest_id, self.problem_id)
    }
  }

  /// URL of the contest's main page.
  pub fn contest_url(&self) -> String {
    let kind = if self.is_gym { "gym" } else { "contest" };
    format!("https://codeforces.com/{kind}/{}", self.contest_id)
  }
}

impl Display for ProblemIdentifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.is_gym {
      write!(f, "gym/")?;
    }
    write!(f, "{}/{}", self.contest_id, self.problem_id)
  }
}

impl FromStr for ProblemIdentifier {
  type Err = EditorialError;

  fn from_str(s: &str) -> Result<Self> { Self::resolve(s) }
}
