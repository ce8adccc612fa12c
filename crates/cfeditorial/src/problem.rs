//! Problem page retrieval and parsing.
//!
//! The problem page is the only page whose layout is required to parse: its title is a hard
//! requirement, everything else (limits, tags, statement excerpt, contest materials) is optional
//! because gym pages and older rounds omit parts of it.

use scraper::{ElementRef, Html, Selector};

use super::*;

lazy_static! {
  static ref TITLE: Selector = Selector::parse("div.problem-statement div.header div.title, div.header div.title, div.title").unwrap();
  static ref TIME_LIMIT: Selector = Selector::parse("div.time-limit").unwrap();
  static ref MEMORY_LIMIT: Selector = Selector::parse("div.memory-limit").unwrap();
  static ref PROPERTY_TITLE: Selector = Selector::parse("div.property-title").unwrap();
  static ref STATEMENT_PARAGRAPH: Selector = Selector::parse("div.problem-statement p").unwrap();
  static ref TAG: Selector = Selector::parse("span.tag-box").unwrap();
  static ref CONTEST_NAME: Selector = Selector::parse("table.rtable th a").unwrap();
  static ref BREADCRUMB: Selector = Selector::parse("div.breadcrumbs a").unwrap();
  static ref SIDEBOX: Selector = Selector::parse("div.sidebox").unwrap();
  static ref CAPTION: Selector = Selector::parse("div.caption").unwrap();
  static ref SIDEBOX_LINK: Selector = Selector::parse("ul li a[href]").unwrap();
  static ref LETTER_PREFIX: Regex = Regex::new(r"^[A-Z][0-9]*\.\s*").unwrap();
}

/// Captions of the sidebar box listing a contest's tutorials and announcements.
const MATERIALS_CAPTIONS: [&str; 2] = ["contest materials", "материалы соревнования"];

/// A link from a contest's "Contest materials" sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLink {
  /// Absolute URL.
  pub url:   String,
  /// Link title as shown on the page.
  pub title: String,
}

/// What the problem page says about a problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemMetadata {
  /// The problem this page describes.
  pub identifier:      ProblemIdentifier,
  /// Problem title without its letter prefix.
  pub title:           String,
  /// Page the metadata was read from.
  pub url:             String,
  /// Name of the contest or gym.
  pub contest_name:    Option<String>,
  /// First paragraphs of the statement.
  pub description:     Option<String>,
  /// Problem tags in page order.
  pub tags:            Vec<String>,
  /// Time limit as displayed, e.g. `2 seconds`.
  pub time_limit:      Option<String>,
  /// Memory limit as displayed, e.g. `256 megabytes`.
  pub memory_limit:    Option<String>,
  /// Contest materials linked from the problem page.
  #[serde(default)]
  pub editorial_links: Vec<MaterialLink>,
}

/// Retrieves metadata for a problem.
#[async_trait]
pub trait FetchMetadata: Send + Sync {
  /// Fetches and parses the problem page.
  ///
  /// # Errors
  ///
  /// - [`EditorialError::ProblemNotFound`] when the page does not exist
  /// - [`EditorialError::Network`] when the page could not be retrieved
  /// - [`EditorialError::Parsing`] when the page has no problem title
  async fn fetch(&self, identifier: &ProblemIdentifier) -> Result<ProblemMetadata>;
}

/// [`FetchMetadata`] implementation reading the Codeforces problem page.
pub struct ProblemPageParser<F> {
  /// Page retrieval.
  fetcher:  F,
  /// Stage timeouts.
  timeouts: TimeoutConfig,
}

impl<F: WebFetch> ProblemPageParser<F> {
  /// Creates a parser on top of a fetch capability.
  pub fn new(fetcher: F, timeouts: TimeoutConfig) -> Self { Self { fetcher, timeouts } }
}

#[async_trait]
impl<F: WebFetch> FetchMetadata for ProblemPageParser<F> {
  async fn fetch(&self, identifier: &ProblemIdentifier) -> Result<ProblemMetadata> {
    let url = identifier.problem_url();
    info!(%identifier, %url, "Fetching problem metadata");

    let response = self
      .fetcher
      .fetch(FetchRequest::for_stage(&url, false, &self.timeouts))
      .await?
      .error_for_status(&url, true)?;

    let metadata = parse_problem_page(identifier, &url, &response.text())?;
    debug!(
      title = %metadata.title,
      tags = metadata.tags.len(),
      materials = metadata.editorial_links.len(),
      "Parsed problem page"
    );
    Ok(metadata)
  }
}

/// Parses a problem page.
pub fn parse_problem_page(
  identifier: &ProblemIdentifier,
  url: &str,
  html: &str,
) -> Result<ProblemMetadata> {
  let document = Html::parse_document(html);

  let title = document
    .select(&TITLE)
    .map(|el| LETTER_PREFIX.replace(&element_text(el), "").trim().to_string())
    .find(|title| !title.is_empty())
    .ok_or_else(|| EditorialError::Parsing(format!("{url}: no problem title on the page")))?;

  let description = {
    let paragraphs: Vec<String> = document
      .select(&STATEMENT_PARAGRAPH)
      .take(3)
      .map(element_text)
      .filter(|p| !p.is_empty())
      .collect();
    (!paragraphs.is_empty()).then(|| paragraphs.join("\n\n"))
  };

  Ok(ProblemMetadata {
    identifier: identifier.clone(),
    title,
    url: url.to_string(),
    contest_name: contest_name(&document),
    description,
    tags: document.select(&TAG).map(element_text).filter(|t| !t.is_empty()).collect(),
    time_limit: property(&document, &TIME_LIMIT),
    memory_limit: property(&document, &MEMORY_LIMIT),
    editorial_links: contest_materials(&document),
  })
}

/// Links listed under the "Contest materials" sidebar box, in page order.
pub fn contest_materials(document: &Html) -> Vec<MaterialLink> {
  let mut links = Vec::new();
  for sidebox in document.select(&SIDEBOX) {
    let is_materials = sidebox.select(&CAPTION).next().is_some_and(|caption| {
      let caption = element_text(caption).to_lowercase();
      MATERIALS_CAPTIONS.iter().any(|c| caption.contains(c))
    });
    if !is_materials {
      continue;
    }
    for anchor in sidebox.select(&SIDEBOX_LINK) {
      let Some(url) = anchor.value().attr("href").and_then(absolute_url) else { continue };
      let title = anchor
        .value()
        .attr("title")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| element_text(anchor));
      if !links.iter().any(|l: &MaterialLink| l.url == url) {
        links.push(MaterialLink { url, title });
      }
    }
  }
  links
}

/// Resolves a link found on a Codeforces page to an absolute `https` URL.
///
/// Fragment-only and `javascript:` links resolve to nothing.
pub fn absolute_url(href: &str) -> Option<String> {
  let href = href.trim();
  if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
    return None;
  }
  let base = Url::parse("https://codeforces.com/").ok()?;
  let mut url = base.join(href).ok()?;
  if url.scheme() == "http" {
    url.set_scheme("https").ok()?;
  }
  url.set_fragment(None);
  Some(url.to_string())
}

/// Whitespace-normalized text content of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
  element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Contest name from the sidebar, else from the breadcrumbs.
fn contest_name(document: &Html) -> Option<String> {
  document
    .select(&CONTEST_NAME)
    .map(element_text)
    .find(|name| !name.is_empty())
    .or_else(|| {
      document
        .select(&BREADCRUMB)
        .filter(|a| {
          a.value().attr("href").is_some_and(|h| h.contains("/contest/") || h.contains("/gym/"))
        })
        .map(element_text)
        .find(|name| !name.is_empty())
    })
}

/// Value of a `time-limit`-style property with its label removed.
fn property(document: &Html, selector: &Selector) -> Option<String> {
  let element = document.select(selector).next()?;
  let text = element_text(element);
  let value = match element.select(&PROPERTY_TITLE).next() {
    Some(label) => text.strip_prefix(&element_text(label)).unwrap_or(&text).trim().to_string(),
    None => text,
  };
  (!value.is_empty()).then_some(value)
}
