//! Prompts sent to the language model.

use super::*;

/// Characters of editorial text embedded in an extraction prompt.
pub const MAX_EDITORIAL_CHARS: usize = 150_000;

/// Characters of page text embedded in a classification prompt.
pub const MAX_SNIPPET_CHARS: usize = 20_000;

/// System message for solution extraction.
pub const EXTRACTION_SYSTEM: &str = "You extract the solution of one specific competitive \
                                     programming problem from a Codeforces editorial that may \
                                     cover many problems. You only restate what the editorial \
                                     says. You always answer with a single JSON object.";

/// System message for candidate classification.
pub const CLASSIFICATION_SYSTEM: &str = "You decide whether a web page is the editorial \
                                         (tutorial, разбор) of a Codeforces contest. You always \
                                         answer with a single JSON object.";

/// Returns at most `max_chars` characters of `text`, cut on a character boundary.
pub fn truncate(text: &str, max_chars: usize) -> &str {
  match text.char_indices().nth(max_chars) {
    Some((index, _)) => &text[..index],
    None => text,
  }
}

/// Builds the prompt asking for the solution of `identifier`'s problem.
///
/// `strict` adds a reminder of the exact response format, for the retry after a malformed
/// completion.
pub fn extraction_prompt(
  identifier: &ProblemIdentifier,
  problem_title: Option<&str>,
  editorial: &str,
  strict: bool,
) -> String {
  let p = &identifier.problem_id;
  let mut markers = format!("{p}. / {p}) / Problem {p} / {} / Задача {p}", identifier.full_id());
  if let Some(title) = problem_title {
    markers.push_str(&format!(" / \"{title}\""));
  }
  let title_line = problem_title.map(|t| format!("Title: {t}\n")).unwrap_or_default();

  let mut prompt = format!(
    r#"Extract the editorial for Problem {p} of Codeforces contest {contest} from the tutorial below.

The section is usually marked as: {markers}
Look for headings and separators (---, ##), case-insensitive. Problems are not always in alphabetical order.

Problem: {p}
Contest: {contest}
{title_line}
Respond with a JSON object with exactly these keys:
- "found": true if the tutorial covers Problem {p}, otherwise false
- "solution_text": the complete explanation for Problem {p}, preserving formatting, formulas and fenced code blocks
- "approach": one or two sentences describing the idea, or null
- "algorithm": the main algorithm or technique, or null
- "time_complexity": e.g. "O(n log n)", or null
- "space_complexity": or null
- "code_snippets": array of {{"language": "...", "code": "...", "description": "..." or null}}, code copied verbatim
- "hints": array of strings, possibly empty
- "notes": anything else relevant, or null

If Problem {p} is not in the tutorial, answer {{"found": false, "notes": "<the problems you see>"}}.
"#,
    contest = identifier.contest_id,
  );
  if strict {
    prompt.push_str(
      "\nYour previous answer was not valid. Answer with the JSON object only. Every key must be \
       present, \"solution_text\" must not be empty, and every code snippet needs a \"language\".\n",
    );
  }
  prompt.push_str("\nTutorial:\n");
  prompt.push_str(truncate(editorial, MAX_EDITORIAL_CHARS));
  prompt
}

/// Builds the prompt asking whether a page is the editorial for the problem's contest.
pub fn classification_prompt(
  identifier: &ProblemIdentifier,
  contest_name: Option<&str>,
  page_title: Option<&str>,
  snippet: &str,
) -> String {
  let contest = match contest_name {
    Some(name) => format!("{name} (contest {})", identifier.contest_id),
    None => format!("contest {}", identifier.contest_id),
  };
  format!(
    r#"Is this page the editorial for Problem {p} of Codeforces {contest}?

Answer with a JSON object: {{"verdict": "YES" | "NO" | "PARTIAL"}}
PARTIAL means the page covers the contest but only some of its problems.

Title: {title}

Content:
{snippet}"#,
    p = identifier.problem_id,
    title = page_title.unwrap_or("(unknown)"),
    snippet = truncate(snippet, MAX_SNIPPET_CHARS),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_on_char_boundary() {
    assert_eq!(truncate("разбор", 3), "раз");
    assert_eq!(truncate("abc", 10), "abc");
    assert_eq!(truncate("", 0), "");
  }

  #[test]
  fn test_extraction_prompt_isolates_problem() {
    let id = ProblemIdentifier::new("1234", "B1", false).unwrap();
    let prompt = extraction_prompt(&id, Some("Easy Version"), "B1. text", false);
    assert!(prompt.contains("Problem B1"));
    assert!(prompt.contains("1234B1"));
    assert!(prompt.contains("Задача B1"));
    assert!(prompt.contains("\"Easy Version\""));
    assert!(prompt.ends_with("Tutorial:\nB1. text"));
    assert!(!prompt.contains("previous answer"));

    let strict = extraction_prompt(&id, None, "text", true);
    assert!(strict.contains("previous answer"));
  }

  #[test]
  fn test_prompts_truncate_documents() {
    let id = ProblemIdentifier::new("1", "A", false).unwrap();
    let long = "¤".repeat(MAX_EDITORIAL_CHARS + 10);
    let prompt = extraction_prompt(&id, None, &long, false);
    assert_eq!(prompt.matches('¤').count(), MAX_EDITORIAL_CHARS);

    let snippet = "¶".repeat(MAX_SNIPPET_CHARS * 2);
    let prompt = classification_prompt(&id, Some("Round 1"), None, &snippet);
    assert_eq!(prompt.matches('¶').count(), MAX_SNIPPET_CHARS);
    assert!(prompt.contains("Round 1 (contest 1)"));
  }
}
