//! The structured solution returned to callers and stored in the cache.

use super::*;

lazy_static! {
  static ref FENCE: Regex = Regex::new(r"(?s)```([\w+#.-]*)[ \t]*\r?\n(.*?)```").unwrap();
}

/// A code sample quoted by an editorial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
  /// Language tag, `text` when unknown.
  pub language:    String,
  /// Code, exactly as it appears in the editorial.
  pub code:        String,
  /// What the snippet shows, if the editorial says.
  #[serde(default)]
  pub description: Option<String>,
}

/// The solution to one problem, distilled from its editorial.
///
/// `problem_id` always equals the id of the identifier the result was requested for, and
/// `extracted_at` is fixed when extraction succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorialResult {
  /// Problem letter this result answers.
  pub problem_id:       String,
  /// The editorial's explanation for the problem.
  pub solution_text:    String,
  /// High-level idea.
  pub approach:         Option<String>,
  /// Named algorithm or technique.
  pub algorithm:        Option<String>,
  /// Time complexity as stated by the editorial.
  pub time_complexity:  Option<String>,
  /// Space complexity as stated by the editorial.
  pub space_complexity: Option<String>,
  /// Code samples in editorial order.
  pub code_snippets:    Vec<CodeSnippet>,
  /// Hints in editorial order.
  pub hints:            Vec<String>,
  /// Anything else worth knowing.
  pub notes:            Option<String>,
  /// Tutorial the result was extracted from.
  pub source_url:       String,
  /// When extraction succeeded.
  pub extracted_at:     DateTime<Utc>,
  /// Model that performed the extraction.
  pub ai_model:         String,
}

/// Code blocks fenced with triple backticks, in order of appearance.
pub fn fenced_snippets(text: &str) -> Vec<CodeSnippet> {
  FENCE
    .captures_iter(text)
    .filter_map(|cap| {
      let code = cap.get(2)?.as_str().trim_end_matches(['\n', '\r']).to_string();
      if code.trim().is_empty() {
        return None;
      }
      let language = cap.get(1).map(|m| m.as_str()).filter(|l| !l.is_empty()).unwrap_or("text");
      Some(CodeSnippet { language: language.to_string(), code, description: None })
    })
    .collect()
}
