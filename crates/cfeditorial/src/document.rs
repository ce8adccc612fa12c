//! Conversion of tutorial candidates into plain text.
//!
//! HTML tutorials are reduced to readable text with their code blocks kept verbatim as fenced
//! blocks; PDF tutorials are converted page by page. Callers only ever see an
//! [`EditorialDocument`], whatever the source format was.

use scraper::{ElementRef, Html, Node, Selector};

use super::*;

lazy_static! {
  static ref CONTAINER: Selector = Selector::parse("div.ttypography").unwrap();
  static ref BODY: Selector = Selector::parse("body").unwrap();
  static ref H1: Selector = Selector::parse("h1").unwrap();
  static ref TITLE: Selector = Selector::parse("title").unwrap();
  static ref CODE: Selector = Selector::parse("code").unwrap();
}

/// Elements whose content never belongs in the text.
const SKIPPED: [&str; 9] =
  ["script", "style", "nav", "footer", "header", "noscript", "iframe", "svg", "form"];

/// Elements rendered on lines of their own.
const BLOCKS: [&str; 22] = [
  "p", "div", "section", "article", "main", "aside", "blockquote", "h1", "h2", "h3", "h4", "h5",
  "h6", "ul", "ol", "li", "table", "tr", "dl", "dt", "dd", "details",
];

/// Full text of a tutorial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorialDocument {
  /// Where the text came from.
  pub source_url:   String,
  /// Readable text with fenced code blocks.
  pub raw_text:     String,
  /// Document title, when known.
  pub title:        Option<String>,
  /// Format the text was decoded from.
  pub content_type: ContentKind,
}

/// Turns a candidate into text.
#[async_trait]
pub trait ExtractDocument: Send + Sync {
  /// Retrieves and decodes the candidate.
  ///
  /// # Errors
  ///
  /// - [`EditorialError::Network`] when the document could not be retrieved
  /// - [`EditorialError::Parsing`] when it cannot be decoded or holds no text
  async fn extract(&self, candidate: &TutorialCandidate) -> Result<EditorialDocument>;
}

/// [`ExtractDocument`] implementation on top of a [`WebFetch`].
pub struct DocumentExtractor<F> {
  /// Page retrieval.
  fetcher:  F,
  /// Decides which pages may need JavaScript rendering.
  policy:   LocatorPolicy,
  /// Stage timeouts.
  timeouts: TimeoutConfig,
}

impl<F: WebFetch> DocumentExtractor<F> {
  /// Creates an extractor.
  pub fn new(fetcher: F, policy: &LocatorPolicy, timeouts: TimeoutConfig) -> Self {
    Self { fetcher, policy: policy.clone(), timeouts }
  }

  /// Fetches a URL, failing on any non-success status.
  async fn get(&self, url: &str, render_js: bool) -> Result<FetchResponse> {
    self
      .fetcher
      .fetch(FetchRequest::for_stage(url, render_js, &self.timeouts))
      .await?
      .error_for_status(url, false)
  }
}

#[async_trait]
impl<F: WebFetch> ExtractDocument for DocumentExtractor<F> {
  async fn extract(&self, candidate: &TutorialCandidate) -> Result<EditorialDocument> {
    let url = candidate.url.as_str();
    debug!(%url, kind = ?candidate.content_type, "Extracting tutorial document");
    let response = self.get(url, false).await?;

    let (raw_text, title) = match candidate.content_type {
      ContentKind::Pdf => {
        let content = crate::pdf::PdfAnalyzer::new().analyze(&response.body)?;
        (content.text(), content.metadata.title.clone())
      },
      ContentKind::Html => {
        if response.is_pdf() {
          return Err(EditorialError::Parsing(format!("{url}: expected HTML, got a PDF")));
        }
        let mut page = html_to_text(&response.text());
        if !page.has_container && self.policy.needs_render(url) {
          debug!(%url, "Tutorial body missing from static page, rendering");
          let rendered = self.get(url, true).await?;
          let rendered = html_to_text(&rendered.text());
          if rendered.has_container || page.text.trim().is_empty() {
            page = rendered;
          }
        }
        (page.text, page.title)
      },
    };

    if raw_text.trim().is_empty() {
      return Err(EditorialError::Parsing(format!("{url}: no text left after extraction")));
    }
    debug!(%url, chars = raw_text.chars().count(), "Extracted tutorial text");
    Ok(EditorialDocument {
      source_url: candidate.url.clone(),
      raw_text,
      title: title.or_else(|| candidate.title.clone()),
      content_type: candidate.content_type,
    })
  }
}

/// Text recovered from an HTML page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlText {
  /// Readable text.
  pub text:          String,
  /// First `<h1>`, else `<title>`.
  pub title:         Option<String>,
  /// Whether the editorial body container was present.
  pub has_container: bool,
}

/// Reduces an HTML page to readable text.
///
/// The editorial body container (`div.ttypography`) is preferred over `<body>`. `<pre>` blocks
/// become fenced code blocks whose content is kept byte for byte.
pub fn html_to_text(html: &str) -> HtmlText {
  let document = Html::parse_document(html);
  let title = document
    .select(&H1)
    .chain(document.select(&TITLE))
    .map(crate::problem::element_text)
    .find(|t| !t.is_empty());

  let container = document.select(&CONTAINER).next();
  let root = container.or_else(|| document.select(&BODY).next());
  let mut out = String::new();
  match root {
    Some(root) => walk(root, &mut out),
    None => walk(document.root_element(), &mut out),
  }

  HtmlText { text: tidy(&out), title, has_container: container.is_some() }
}

/// Appends the text of `element`'s children to `out`.
fn walk(element: ElementRef<'_>, out: &mut String) {
  for child in element.children() {
    match child.value() {
      Node::Text(text) => push_inline(out, text),
      Node::Element(_) => {
        let Some(child) = ElementRef::wrap(child) else { continue };
        let name = child.value().name();
        if SKIPPED.contains(&name) {
          continue;
        }
        match name {
          "pre" => push_fence(out, child),
          "br" => out.push('\n'),
          "hr" => out.push_str("\n---\n"),
          name if BLOCKS.contains(&name) => {
            out.push('\n');
            if name == "li" {
              out.push_str("- ");
            }
            walk(child, out);
            out.push('\n');
          },
          _ => walk(child, out),
        }
      },
      _ => {},
    }
  }
}

/// Appends a text node with its whitespace collapsed.
fn push_inline(out: &mut String, text: &str) {
  let starts_with_space = text.starts_with(char::is_whitespace);
  let ends_with_space = text.ends_with(char::is_whitespace);
  let words: Vec<&str> = text.split_whitespace().collect();
  if words.is_empty() {
    if !text.is_empty() && !out.ends_with(char::is_whitespace) && !out.is_empty() {
      out.push(' ');
    }
    return;
  }
  if starts_with_space && !out.is_empty() && !out.ends_with(char::is_whitespace) {
    out.push(' ');
  }
  out.push_str(&words.join(" "));
  if ends_with_space {
    out.push(' ');
  }
}

/// Appends a `<pre>` block as a fenced code block.
fn push_fence(out: &mut String, pre: ElementRef<'_>) {
  let language = code_language(pre)
    .or_else(|| pre.select(&CODE).next().and_then(code_language))
    .unwrap_or_default();
  let code: String = pre.text().collect();
  let code = code.strip_prefix('\n').unwrap_or(&code);
  out.push_str("\n```");
  out.push_str(&language);
  out.push('\n');
  out.push_str(code.trim_end_matches(['\n', '\r']));
  out.push_str("\n```\n");
}

/// Language named by a `lang-*` or `language-*` class.
fn code_language(element: ElementRef<'_>) -> Option<String> {
  element.value().classes().find_map(|class| {
    class
      .strip_prefix("language-")
      .or_else(|| class.strip_prefix("lang-"))
      .filter(|lang| !lang.is_empty())
      .map(str::to_string)
  })
}

/// Trims trailing spaces and collapses blank lines outside fenced blocks.
fn tidy(text: &str) -> String {
  let mut lines: Vec<&str> = Vec::new();
  let mut in_fence = false;
  for line in text.lines() {
    if line.trim_start().starts_with("```") {
      in_fence = !in_fence;
      lines.push(line.trim());
      continue;
    }
    if in_fence {
      lines.push(line);
      continue;
    }
    let line = line.trim();
    if line.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
      continue;
    }
    lines.push(line);
  }
  while lines.last().is_some_and(|last| last.is_empty()) {
    lines.pop();
  }
  lines.join("\n")
}
