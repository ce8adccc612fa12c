//! Tutorial discovery.
//!
//! Editorials are rarely linked from the problem statement itself. The locator collects
//! candidates from the places Codeforces usually links them, in this order:
//!
//! 1. the "Contest materials" sidebar of the problem page
//! 2. the same sidebar on the contest page, rendered if the static page lacks it
//! 3. tutorial links inside the contest's announcement posts
//! 4. a blog search for the contest's tutorial
//!
//! Each candidate carries the [`Signal`] that produced it, and its confidence is the weight the
//! [`LocatorPolicy`] assigns to that signal. When no candidate is confident enough, the language
//! model is asked whether the weaker ones look like an editorial for the contest.
//!
//! Discovery never fails: strategies that error are logged and skipped, and an empty list means
//! nothing was found.

use scraper::{Html, Selector};
use serde_json::Value;

use super::*;

lazy_static! {
  static ref BLOG_ENTRY: Regex = Regex::new(r#"href="((?:https?://codeforces\.(?:com|ru))?/blog/entry/\d+)""#).unwrap();
  static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
  static ref POST_BODY: Selector = Selector::parse("div.ttypography").unwrap();
}

/// Format of a tutorial document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
  /// A web page.
  Html,
  /// A PDF attachment.
  Pdf,
}

impl ContentKind {
  /// Infers the format from a URL: `.pdf` files and contest attachment downloads are PDFs.
  pub fn from_url(url: &str) -> Self {
    let path = Url::parse(url).map(|u| u.path().to_lowercase()).unwrap_or_else(|_| url.to_lowercase());
    if path.ends_with(".pdf") || path.contains("/attachments/download/") {
      Self::Pdf
    } else {
      Self::Html
    }
  }
}

/// How a candidate was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
  /// Linked as a tutorial.
  DirectTutorial,
  /// Judged plausible by the language model.
  AiConfirmed,
  /// A contest announcement.
  Announcement,
  /// A blog search hit.
  SearchMatch,
}

impl Signal {
  /// Confidence of this signal under the given weights.
  pub fn weight(self, weights: &SignalWeights) -> u8 {
    match self {
      Self::DirectTutorial => weights.direct_tutorial,
      Self::AiConfirmed => weights.ai_confirmed,
      Self::Announcement => weights.announcement,
      Self::SearchMatch => weights.search_match,
    }
  }
}

/// A document that may hold the editorial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialCandidate {
  /// Absolute URL.
  pub url:          String,
  /// Format of the document.
  pub content_type: ContentKind,
  /// Rank: higher is tried first.
  pub confidence:   u8,
  /// How the candidate was found.
  pub signal:       Signal,
  /// Link text, when known.
  pub title:        Option<String>,
}

impl TutorialCandidate {
  /// Candidate with the content type inferred from its URL.
  pub fn new(url: impl Into<String>, signal: Signal, confidence: u8) -> Self {
    let url = url.into();
    Self { content_type: ContentKind::from_url(&url), url, confidence, signal, title: None }
  }

  /// Sets the link text.
  pub fn with_title(mut self, title: impl Into<String>) -> Self {
    self.title = Some(title.into());
    self
  }
}

/// Finds tutorial candidates for a problem.
#[async_trait]
pub trait LocateTutorials: Send + Sync {
  /// Returns candidates ordered by descending confidence. Never fails; an empty list means no
  /// candidate was found.
  async fn locate(&self, metadata: &ProblemMetadata) -> Vec<TutorialCandidate>;
}

/// Candidates in discovery order, deduplicated by URL.
#[derive(Debug, Default)]
struct Candidates(Vec<TutorialCandidate>);

impl Candidates {
  /// Adds a candidate, keeping the higher confidence when the URL is already known.
  fn push(&mut self, candidate: TutorialCandidate) {
    match self.0.iter_mut().find(|c| c.url == candidate.url) {
      Some(existing) if existing.confidence < candidate.confidence => {
        existing.confidence = candidate.confidence;
        existing.signal = candidate.signal;
        existing.title = candidate.title.or(existing.title.take());
      },
      Some(existing) =>
        if existing.title.is_none() {
          existing.title = candidate.title;
        },
      None => self.0.push(candidate),
    }
  }

  /// Highest confidence so far.
  fn best(&self) -> u8 { self.0.iter().map(|c| c.confidence).max().unwrap_or(0) }

  /// Whether a candidate with this signal is known.
  fn has(&self, signal: Signal) -> bool { self.0.iter().any(|c| c.signal == signal) }

  /// Stable sort by descending confidence, truncated to `limit`.
  fn ranked(mut self, limit: usize) -> Vec<TutorialCandidate> {
    self.0.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    self.0.truncate(limit);
    self.0
  }
}

/// Default [`LocateTutorials`] implementation.
pub struct TutorialLocator<F> {
  /// Page retrieval.
  fetcher:    F,
  /// Classification fallback, if a model is available.
  completion: Option<Arc<dyn Completion>>,
  /// Ranking policy.
  policy:     LocatorPolicy,
  /// Stage timeouts.
  timeouts:   TimeoutConfig,
}

impl<F: WebFetch> TutorialLocator<F> {
  /// Creates a locator without classification fallback.
  pub fn new(fetcher: F, policy: LocatorPolicy, timeouts: TimeoutConfig) -> Self {
    Self { fetcher, completion: None, policy, timeouts }
  }

  /// Enables classification of weak candidates by a language model.
  pub fn with_completion(mut self, completion: Arc<dyn Completion>) -> Self {
    self.completion = Some(completion);
    self
  }

  /// Fetches a page as text, failing on any non-success status.
  async fn page(&self, url: &str, render_js: bool) -> Result<String> {
    let response = self
      .fetcher
      .fetch(FetchRequest::for_stage(url, render_js, &self.timeouts))
      .await?
      .error_for_status(url, false)?;
    Ok(response.text())
  }

  /// Turns a contest-materials link into a candidate.
  fn material(&self, link: &MaterialLink) -> TutorialCandidate {
    let weights = &self.policy.weights;
    let signal = if self.policy.is_tutorial(&link.title)
      || ContentKind::from_url(&link.url) == ContentKind::Pdf
    {
      Signal::DirectTutorial
    } else {
      Signal::Announcement
    };
    TutorialCandidate::new(&link.url, signal, signal.weight(weights)).with_title(&link.title)
  }

  /// Strategy 2: the contest page's materials sidebar.
  async fn contest_page(&self, metadata: &ProblemMetadata) -> Result<Vec<MaterialLink>> {
    let url = metadata.identifier.contest_url();
    let links = materials_in(&self.page(&url, false).await?);
    if !links.is_empty() || !self.policy.needs_render(&url) {
      return Ok(links);
    }
    debug!(%url, "No contest materials in static contest page, rendering");
    Ok(materials_in(&self.page(&url, true).await?))
  }

  /// Strategy 3: tutorial links inside one announcement post.
  async fn announcement_links(&self, url: &str) -> Result<Vec<MaterialLink>> {
    let html = self.page(url, false).await?;
    Ok(tutorial_links_in(&html, url, &self.policy))
  }

  /// Strategy 4: blog search results.
  ///
  /// Only the first `search_limit` hits are opened, and a hit is kept when its page mentions the
  /// problem or its contest.
  async fn search(&self, metadata: &ProblemMetadata) -> Result<Vec<String>> {
    let identifier = &metadata.identifier;
    let url = format!("https://codeforces.com/search?query=contest+{}+tutorial", identifier.contest_id);
    let html = self.page(&url, false).await?;
    let mut hits: Vec<String> = Vec::new();
    for cap in BLOG_ENTRY.captures_iter(&html) {
      let Some(entry) = absolute_url(&cap[1]) else { continue };
      if !hits.contains(&entry) {
        hits.push(entry);
      }
      if hits.len() >= self.policy.search_limit {
        break;
      }
    }

    let mut found = Vec::with_capacity(hits.len());
    for entry in hits {
      match self.page(&entry, false).await {
        Ok(page) if mentions_problem(&page, identifier) => found.push(entry),
        Ok(_) => debug!(url = %entry, "Search result does not mention the problem"),
        Err(e) => debug!(url = %entry, error = %e, "Could not fetch search result"),
      }
    }
    Ok(found)
  }

  /// Asks the model whether a candidate is the editorial for the contest.
  ///
  /// `Some(true)` promotes, `Some(false)` drops, `None` leaves the candidate unchanged.
  async fn classify(
    &self,
    completion: &dyn Completion,
    metadata: &ProblemMetadata,
    candidate: &TutorialCandidate,
  ) -> Option<bool> {
    let snippet = match candidate.content_type {
      ContentKind::Pdf => String::new(),
      ContentKind::Html => match self.page(&candidate.url, false).await {
        Ok(html) => crate::document::html_to_text(&html).text,
        Err(e) => {
          warn!(url = %candidate.url, error = %e, "Could not fetch candidate for classification");
          return None;
        },
      },
    };
    let request = CompletionRequest::new(ResponseSchema::Classification)
      .with_system(crate::prompts::CLASSIFICATION_SYSTEM)
      .with_prompt(crate::prompts::classification_prompt(
        &metadata.identifier,
        metadata.contest_name.as_deref(),
        candidate.title.as_deref(),
        &snippet,
      ));
    match completion.complete(request).await {
      Ok(value) => parse_verdict(&value),
      Err(e) => {
        warn!(url = %candidate.url, error = %e, "Candidate classification failed");
        None
      },
    }
  }

  /// Classifies every candidate below the fallback threshold.
  async fn ai_fallback(
    &self,
    completion: &dyn Completion,
    metadata: &ProblemMetadata,
    candidates: Candidates,
  ) -> Candidates {
    let threshold = self.policy.ai_fallback_below;
    let promoted = self.policy.weights.ai_confirmed;
    let mut kept = Candidates::default();
    for mut candidate in candidates.0 {
      if candidate.confidence >= threshold {
        kept.push(candidate);
        continue;
      }
      match self.classify(completion, metadata, &candidate).await {
        Some(true) => {
          debug!(url = %candidate.url, "Candidate confirmed by model");
          if promoted > candidate.confidence {
            candidate.confidence = promoted;
            candidate.signal = Signal::AiConfirmed;
          }
          kept.push(candidate);
        },
        Some(false) => debug!(url = %candidate.url, "Candidate rejected by model"),
        None => kept.push(candidate),
      }
    }
    kept
  }
}

#[async_trait]
impl<F: WebFetch> LocateTutorials for TutorialLocator<F> {
  async fn locate(&self, metadata: &ProblemMetadata) -> Vec<TutorialCandidate> {
    let identifier = &metadata.identifier;
    info!(%identifier, "Locating tutorial candidates");
    let weights = &self.policy.weights;
    let mut candidates = Candidates::default();

    if self.policy.use_problem_page {
      for link in &metadata.editorial_links {
        candidates.push(self.material(link));
      }
    }

    if self.policy.use_contest_page && metadata.editorial_links.is_empty() {
      match self.contest_page(metadata).await {
        Ok(links) => links.iter().for_each(|link| candidates.push(self.material(link))),
        Err(e) => warn!(%identifier, error = %e, "Contest page strategy failed"),
      }
    }

    if self.policy.use_announcements && !candidates.has(Signal::DirectTutorial) {
      let mut announcements: Vec<&TutorialCandidate> = candidates
        .0
        .iter()
        .filter(|c| c.signal == Signal::Announcement && c.content_type == ContentKind::Html)
        .collect();
      announcements
        .sort_by_key(|c| !c.title.as_deref().is_some_and(|t| self.policy.is_announcement(t)));
      let announcements: Vec<String> = announcements
        .into_iter()
        .take(self.policy.follow_announcements)
        .map(|c| c.url.clone())
        .collect();
      for url in announcements {
        match self.announcement_links(&url).await {
          Ok(links) =>
            for link in links {
              let signal = Signal::DirectTutorial;
              candidates
                .push(TutorialCandidate::new(&link.url, signal, signal.weight(weights)).with_title(link.title));
            },
          Err(e) => warn!(%url, error = %e, "Announcement strategy failed"),
        }
      }
    }

    if self.policy.use_search && !candidates.has(Signal::DirectTutorial) {
      match self.search(metadata).await {
        Ok(urls) =>
          for url in urls {
            let signal = Signal::SearchMatch;
            candidates.push(TutorialCandidate::new(url, signal, signal.weight(weights)));
          },
        Err(e) => warn!(%identifier, error = %e, "Blog search strategy failed"),
      }
    }

    if self.policy.use_ai_fallback && candidates.best() < self.policy.ai_fallback_below {
      if let Some(completion) = &self.completion {
        candidates = self.ai_fallback(completion.as_ref(), metadata, candidates).await;
      }
    }

    let ranked = candidates.ranked(self.policy.max_candidates);
    info!(%identifier, candidates = ranked.len(), "Located tutorial candidates");
    for (rank, candidate) in ranked.iter().enumerate() {
      debug!(rank, url = %candidate.url, confidence = candidate.confidence, signal = ?candidate.signal, "Candidate");
    }
    ranked
  }
}

/// Contest materials links of a page.
fn materials_in(html: &str) -> Vec<MaterialLink> { contest_materials(&Html::parse_document(html)) }

/// Links inside a post that look like tutorials, excluding links back to the post.
fn tutorial_links_in(html: &str, page_url: &str, policy: &LocatorPolicy) -> Vec<MaterialLink> {
  let document = Html::parse_document(html);
  let body = document.select(&POST_BODY).next();
  let anchors: Vec<_> = match body {
    Some(body) => body.select(&ANCHOR).collect(),
    None => document.select(&ANCHOR).collect(),
  };

  let mut links: Vec<MaterialLink> = Vec::new();
  for anchor in anchors {
    let text = crate::problem::element_text(anchor);
    let title = anchor.value().attr("title").unwrap_or_default();
    if !policy.is_tutorial(&text) && !policy.is_tutorial(title) {
      continue;
    }
    let Some(url) = anchor.value().attr("href").and_then(absolute_url) else { continue };
    if url == page_url || links.iter().any(|l| l.url == url) {
      continue;
    }
    links.push(MaterialLink { url, title: if text.is_empty() { title.to_string() } else { text } });
  }
  links
}

/// Whether a page names the problem (`2000B`) or its contest id as a whole word.
fn mentions_problem(html: &str, identifier: &ProblemIdentifier) -> bool {
  let pattern = format!(
    r"(?i)\b(?:{}|{})\b",
    regex::escape(&identifier.full_id()),
    regex::escape(&identifier.contest_id)
  );
  Regex::new(&pattern).is_ok_and(|re| re.is_match(html))
}

/// Reads a classification verdict. `PARTIAL` counts as plausible.
fn parse_verdict(value: &Value) -> Option<bool> {
  let verdict = value.get("verdict")?.as_str()?.trim().to_uppercase();
  match verdict.as_str() {
    "YES" | "PARTIAL" => Some(true),
    "NO" => Some(false),
    _ => None,
  }
}
