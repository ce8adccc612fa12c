//! Solution extraction from a tutorial with the language model.
//!
//! Tutorials usually cover a whole contest. The model is given the full text and the identifier
//! of the one problem wanted, and answers with the structured fields of an [`EditorialResult`].
//! Every completion is validated before a result is built from it.

use serde_json::{Map, Value};

use super::*;

/// Pulls the solution of one problem out of a tutorial.
#[async_trait]
pub trait ExtractSolution: Send + Sync {
  /// Extracts the solution of `identifier`'s problem from `document`.
  ///
  /// # Errors
  ///
  /// - [`EditorialError::Extraction`] when the model reports the problem is not covered
  /// - [`EditorialError::OpenAi`] when the model is unavailable or keeps answering malformed
  ///   output
  async fn extract_solution(
    &self,
    document: &EditorialDocument,
    identifier: &ProblemIdentifier,
    problem_title: Option<&str>,
  ) -> Result<EditorialResult>;
}

/// Why a completion was rejected.
#[derive(Debug)]
enum Rejection {
  /// The model says the problem is not in the document.
  NotFound(Option<String>),
  /// The completion does not have the requested shape.
  Malformed(String),
}

/// Validated fields of a completion.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::missing_docs_in_private_items)]
struct Solution {
  solution_text:    String,
  approach:         Option<String>,
  algorithm:        Option<String>,
  time_complexity:  Option<String>,
  space_complexity: Option<String>,
  code_snippets:    Vec<CodeSnippet>,
  hints:            Vec<String>,
  notes:            Option<String>,
}

/// [`ExtractSolution`] implementation backed by a [`Completion`].
pub struct SolutionExtractor {
  /// The language model.
  completion: Arc<dyn Completion>,
}

impl SolutionExtractor {
  /// Attempts per document: the second one carries a stricter format reminder.
  const ATTEMPTS: usize = 2;

  /// Creates an extractor.
  pub fn new(completion: Arc<dyn Completion>) -> Self { Self { completion } }
}

#[async_trait]
impl ExtractSolution for SolutionExtractor {
  async fn extract_solution(
    &self,
    document: &EditorialDocument,
    identifier: &ProblemIdentifier,
    problem_title: Option<&str>,
  ) -> Result<EditorialResult> {
    info!(%identifier, url = %document.source_url, "Extracting solution");
    let mut last_problem = String::new();
    for attempt in 0..Self::ATTEMPTS {
      let strict = attempt > 0;
      let request = CompletionRequest::new(ResponseSchema::Solution)
        .with_system(crate::prompts::EXTRACTION_SYSTEM)
        .with_prompt(crate::prompts::extraction_prompt(
          identifier,
          problem_title,
          &document.raw_text,
          strict,
        ));

      let verdict = match self.completion.complete(request).await {
        Ok(value) => validate(&value),
        Err(EditorialError::MalformedCompletion(problem)) => Err(Rejection::Malformed(problem)),
        Err(e) => return Err(e),
      };
      match verdict {
        Ok(solution) => {
          debug!(%identifier, snippets = solution.code_snippets.len(), "Solution extracted");
          return Ok(EditorialResult {
            problem_id:       identifier.problem_id.clone(),
            solution_text:    solution.solution_text,
            approach:         solution.approach,
            algorithm:        solution.algorithm,
            time_complexity:  solution.time_complexity,
            space_complexity: solution.space_complexity,
            code_snippets:    solution.code_snippets,
            hints:            solution.hints,
            notes:            solution.notes,
            source_url:       document.source_url.clone(),
            extracted_at:     Utc::now(),
            ai_model:         self.completion.model().to_string(),
          });
        },
        Err(Rejection::NotFound(notes)) => {
          let mut message = format!("problem {identifier} not found in {}", document.source_url);
          if let Some(notes) = notes {
            message.push_str(&format!(" ({notes})"));
          }
          return Err(EditorialError::Extraction(message));
        },
        Err(Rejection::Malformed(problem)) => {
          warn!(%identifier, attempt = attempt + 1, %problem, "Malformed completion");
          last_problem = problem;
        },
      }
    }
    Err(EditorialError::OpenAi(format!("malformed completion for {identifier}: {last_problem}")))
  }
}

/// Checks a completion against the solution schema.
fn validate(value: &Value) -> core::result::Result<Solution, Rejection> {
  let object = value.as_object().ok_or_else(|| malformed("completion is not an object"))?;

  match object.get("found") {
    Some(Value::Bool(true)) => {},
    Some(Value::Bool(false)) =>
      return Err(Rejection::NotFound(optional_string(object, "notes").ok().flatten())),
    _ => return Err(malformed("'found' must be a boolean")),
  }

  let solution_text = match object.get("solution_text") {
    Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
    _ => return Err(malformed("'solution_text' must be a non-empty string")),
  };

  let mut code_snippets = snippets(object)?;
  if code_snippets.is_empty() {
    code_snippets = fenced_snippets(&solution_text);
  }

  Ok(Solution {
    approach: optional_string(object, "approach")?,
    algorithm: optional_string(object, "algorithm")?,
    time_complexity: optional_string(object, "time_complexity")?,
    space_complexity: optional_string(object, "space_complexity")?,
    hints: hints(object)?,
    notes: optional_string(object, "notes")?,
    code_snippets,
    solution_text,
  })
}

/// Shorthand for a malformed rejection.
fn malformed(problem: impl Into<String>) -> Rejection { Rejection::Malformed(problem.into()) }

/// A key that must be present and either a string or null. Blank strings become `None`.
fn optional_string(
  object: &Map<String, Value>,
  key: &str,
) -> core::result::Result<Option<String>, Rejection> {
  match object.get(key) {
    Some(Value::Null) => Ok(None),
    Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
    Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
    Some(_) => Err(malformed(format!("'{key}' must be a string or null"))),
    None => Err(malformed(format!("'{key}' is missing"))),
  }
}

/// The `code_snippets` array. Every entry needs a language and code.
fn snippets(object: &Map<String, Value>) -> core::result::Result<Vec<CodeSnippet>, Rejection> {
  let Some(Value::Array(entries)) = object.get("code_snippets") else {
    return Err(malformed("'code_snippets' must be an array"));
  };
  entries
    .iter()
    .enumerate()
    .map(|(i, entry)| {
      let entry = entry.as_object().ok_or_else(|| malformed(format!("code_snippets[{i}] is not an object")))?;
      let language = match entry.get("language") {
        Some(Value::String(l)) if !l.trim().is_empty() => l.trim().to_string(),
        _ => return Err(malformed(format!("code_snippets[{i}] has no language"))),
      };
      let code = match entry.get("code") {
        Some(Value::String(c)) => c.clone(),
        _ => return Err(malformed(format!("code_snippets[{i}] has no code"))),
      };
      let description = entry
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
      Ok(CodeSnippet { language, code, description })
    })
    .collect()
}

/// The `hints` array of strings.
fn hints(object: &Map<String, Value>) -> core::result::Result<Vec<String>, Rejection> {
  let Some(Value::Array(entries)) = object.get("hints") else {
    return Err(malformed("'hints' must be an array"));
  };
  entries
    .iter()
    .map(|hint| {
      hint.as_str().map(str::to_string).ok_or_else(|| malformed("'hints' must only hold strings"))
    })
    .collect()
}
