//! End-to-end editorial lookup.
//!
//! The [`Orchestrator`] runs the pipeline for one problem URL:
//!
//! 1. resolve the URL into a [`ProblemIdentifier`]
//! 2. serve the result from the cache when allowed
//! 3. fetch the problem metadata
//! 4. locate tutorial candidates
//! 5. try each candidate in rank order until one yields a validated result
//! 6. cache the result
//!
//! A failing candidate is logged and skipped. Cache failures never fail a request: a read error
//! counts as a miss and a write error is only logged.
//!
//! # Examples
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use cfeditorial::{cache::MemoryStore, config::Config, orchestrator::Orchestrator};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default().with_api_key("sk-...");
//! let orchestrator =
//!   Orchestrator::builder().with_config(config).with_store(Arc::new(MemoryStore::new())).build().await?;
//!
//! let result = orchestrator.process("https://codeforces.com/problemset/problem/1/A", true).await?;
//! for snippet in &result.code_snippets {
//!   println!("```{}\n{}\n```", snippet.language, snippet.code);
//! }
//! # Ok(())
//! # }
//! ```

use super::*;

/// Runs the editorial pipeline.
pub struct Orchestrator {
  /// Problem page reader.
  metadata:     Arc<dyn FetchMetadata>,
  /// Tutorial discovery.
  locator:      Arc<dyn LocateTutorials>,
  /// Tutorial decoding.
  documents:    Arc<dyn ExtractDocument>,
  /// Solution extraction.
  extractor:    Arc<dyn ExtractSolution>,
  /// Result cache.
  cache:        ResultCache,
  /// In-flight deduplication, when enabled.
  locks:        Option<Arc<KeyedLocks>>,
  /// Upper bound on waiting for another request's extraction.
  lock_timeout: Duration,
}

impl Orchestrator {
  /// Starts building an orchestrator.
  pub fn builder() -> OrchestratorBuilder { OrchestratorBuilder::default() }

  /// Builds an orchestrator with the production components for `config`.
  pub async fn from_config(config: &Config) -> Result<Self> {
    Self::builder().with_config(config.clone()).build().await
  }

  /// Returns the solution for the problem at `url`.
  ///
  /// With `use_cache` unset the cache is not read, but the fresh result is still stored.
  ///
  /// # Errors
  ///
  /// - [`EditorialError::UrlParse`] for URLs that name no problem
  /// - [`EditorialError::ProblemNotFound`] when the problem page does not exist
  /// - [`EditorialError::EditorialNotFound`] when no candidate yields a result
  /// - [`EditorialError::OpenAi`] when every candidate was dropped and the model failed on at
  ///   least one of them
  /// - any error that is not specific to a single candidate
  pub async fn process(&self, url: &str, use_cache: bool) -> Result<EditorialResult> {
    let identifier = ProblemIdentifier::resolve(url)?;
    self.run(&identifier, use_cache, None).await
  }

  /// Like [`Orchestrator::process`], also returning the problem's metadata.
  ///
  /// The problem page is downloaded once and shared with the pipeline on a cache miss.
  pub async fn process_with_problem(
    &self,
    url: &str,
    use_cache: bool,
  ) -> Result<(ProblemMetadata, EditorialResult)> {
    let identifier = ProblemIdentifier::resolve(url)?;
    let metadata = self.metadata.fetch(&identifier).await?;
    let result = self.run(&identifier, use_cache, Some(&metadata)).await?;
    Ok((metadata, result))
  }

  /// Cache lookup, locking and computation for one problem.
  async fn run(
    &self,
    identifier: &ProblemIdentifier,
    use_cache: bool,
    metadata: Option<&ProblemMetadata>,
  ) -> Result<EditorialResult> {
    info!(%identifier, use_cache, "Processing editorial request");

    if use_cache {
      if let Some(result) = self.cached(identifier).await {
        return Ok(result);
      }
    }

    let guard = match &self.locks {
      Some(locks) => locks.acquire(&self.cache.key(identifier), self.lock_timeout).await,
      None => None,
    };
    if use_cache && guard.is_some() {
      if let Some(result) = self.cached(identifier).await {
        debug!(%identifier, "Result produced by a concurrent request");
        return Ok(result);
      }
    }

    let start = std::time::Instant::now();
    let result = self.compute(identifier, metadata).await?;
    info!(
      %identifier,
      source = %result.source_url,
      duration_ms = start.elapsed().as_millis(),
      "Editorial extracted"
    );

    if let Err(e) = self.cache.set(identifier, &result).await {
      warn!(%identifier, error = %e, "Failed to cache result");
    }
    drop(guard);
    Ok(result)
  }

  /// Removes the cached result for the problem at `url`. Returns whether one was present.
  pub async fn invalidate(&self, url: &str) -> Result<bool> {
    let identifier = ProblemIdentifier::resolve(url)?;
    let removed = self.cache.invalidate(&identifier).await?;
    info!(%identifier, removed, "Invalidated cached result");
    Ok(removed)
  }

  /// Removes every cached result. Returns how many were removed.
  pub async fn clear_cache(&self) -> Result<u64> {
    let removed = self.cache.clear().await?;
    info!(removed, "Cleared result cache");
    Ok(removed)
  }

  /// Cache lookup that degrades to a miss on failure.
  async fn cached(&self, identifier: &ProblemIdentifier) -> Option<EditorialResult> {
    match self.cache.get(identifier).await {
      Ok(Some(result)) => {
        info!(%identifier, "Serving cached result");
        Some(result)
      },
      Ok(None) => None,
      Err(e) => {
        warn!(%identifier, error = %e, "Cache read failed, treating as miss");
        None
      },
    }
  }

  /// Metadata, discovery and candidate iteration.
  ///
  /// When every candidate fails and at least one failed in the model call, the last model error
  /// is returned instead of [`EditorialError::EditorialNotFound`], so an unavailable model is not
  /// reported as a missing editorial.
  async fn compute(
    &self,
    identifier: &ProblemIdentifier,
    metadata: Option<&ProblemMetadata>,
  ) -> Result<EditorialResult> {
    let fetched;
    let metadata = match metadata {
      Some(metadata) => metadata,
      None => {
        fetched = self.metadata.fetch(identifier).await?;
        &fetched
      },
    };
    let candidates = self.locator.locate(metadata).await;
    info!(%identifier, candidates = candidates.len(), "Trying tutorial candidates");

    let mut model_error = None;
    for (rank, candidate) in candidates.iter().enumerate() {
      match self.try_candidate(identifier, metadata, candidate).await {
        Ok(result) => return Ok(result),
        Err(e) if e.is_candidate_failure() => {
          warn!(
            %identifier,
            rank,
            url = %candidate.url,
            kind = e.error_type(),
            error = %e,
            "Candidate failed, trying next"
          );
          if matches!(e, EditorialError::OpenAi(_) | EditorialError::MalformedCompletion(_)) {
            model_error = Some(e);
          }
        },
        Err(e) => return Err(e),
      }
    }
    Err(model_error.unwrap_or_else(|| EditorialError::EditorialNotFound(identifier.to_string())))
  }

  /// Document extraction followed by solution extraction for one candidate.
  async fn try_candidate(
    &self,
    identifier: &ProblemIdentifier,
    metadata: &ProblemMetadata,
    candidate: &TutorialCandidate,
  ) -> Result<EditorialResult> {
    debug!(%identifier, url = %candidate.url, confidence = candidate.confidence, "Trying candidate");
    let document = self.documents.extract(candidate).await?;
    self.extractor.extract_solution(&document, identifier, Some(metadata.title.as_str())).await
  }
}

/// Assembles an [`Orchestrator`] from a [`Config`] and injected capabilities.
///
/// Anything not injected is built from the configuration: an [`HttpFetcher`], an
/// [`OpenAiClient`], and the configured cache backend.
#[derive(Default)]
pub struct OrchestratorBuilder {
  /// Configuration; defaults when unset.
  config:     Option<Config>,
  /// Web fetch capability.
  fetcher:    Option<Arc<dyn WebFetch>>,
  /// Language model capability.
  completion: Option<Arc<dyn Completion>>,
  /// Cache backend.
  store:      Option<Arc<dyn CacheStore>>,
  /// Metadata stage override.
  metadata:   Option<Arc<dyn FetchMetadata>>,
  /// Locator stage override.
  locator:    Option<Arc<dyn LocateTutorials>>,
  /// Document stage override.
  documents:  Option<Arc<dyn ExtractDocument>>,
  /// Extraction stage override.
  extractor:  Option<Arc<dyn ExtractSolution>>,
}

impl OrchestratorBuilder {
  /// Sets the configuration.
  pub fn with_config(mut self, config: Config) -> Self {
    self.config = Some(config);
    self
  }

  /// Sets the web fetch capability used by the default stages.
  pub fn with_fetcher(mut self, fetcher: Arc<dyn WebFetch>) -> Self {
    self.fetcher = Some(fetcher);
    self
  }

  /// Sets the language model used by the default stages.
  pub fn with_completion(mut self, completion: Arc<dyn Completion>) -> Self {
    self.completion = Some(completion);
    self
  }

  /// Sets the cache backend.
  pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
    self.store = Some(store);
    self
  }

  /// Replaces the metadata stage.
  pub fn with_metadata(mut self, metadata: Arc<dyn FetchMetadata>) -> Self {
    self.metadata = Some(metadata);
    self
  }

  /// Replaces the locator stage.
  pub fn with_locator(mut self, locator: Arc<dyn LocateTutorials>) -> Self {
    self.locator = Some(locator);
    self
  }

  /// Replaces the document stage.
  pub fn with_documents(mut self, documents: Arc<dyn ExtractDocument>) -> Self {
    self.documents = Some(documents);
    self
  }

  /// Replaces the extraction stage.
  pub fn with_extractor(mut self, extractor: Arc<dyn ExtractSolution>) -> Self {
    self.extractor = Some(extractor);
    self
  }

  /// Builds the orchestrator.
  ///
  /// # Errors
  ///
  /// - [`EditorialError::Config`] when the configuration is invalid, or no language model is
  ///   available while the default extraction stage is needed
  /// - [`EditorialError::Cache`] when the cache backend cannot be opened
  pub async fn build(self) -> Result<Orchestrator> {
    let config = self.config.unwrap_or_default();
    config.validate()?;

    let fetcher: Arc<dyn WebFetch> = match self.fetcher {
      Some(fetcher) => fetcher,
      None => Arc::new(HttpFetcher::new(&config.http)?),
    };

    let completion = match self.completion {
      Some(completion) => Some(completion),
      None => match OpenAiClient::from_config(&config) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn Completion>),
        Err(e) => {
          debug!(error = %e, "No language model configured");
          None
        },
      },
    };

    let extractor: Arc<dyn ExtractSolution> = match (self.extractor, &completion) {
      (Some(extractor), _) => extractor,
      (None, Some(completion)) => Arc::new(SolutionExtractor::new(completion.clone())),
      (None, None) =>
        return Err(EditorialError::Config(
          "OPENAI_API_KEY is not set; a language model is required for extraction".into(),
        )),
    };

    let metadata: Arc<dyn FetchMetadata> = match self.metadata {
      Some(metadata) => metadata,
      None => Arc::new(ProblemPageParser::new(fetcher.clone(), config.timeouts.clone())),
    };

    let locator: Arc<dyn LocateTutorials> = match self.locator {
      Some(locator) => locator,
      None => {
        let locator =
          TutorialLocator::new(fetcher.clone(), config.locator.clone(), config.timeouts.clone());
        match &completion {
          Some(completion) => Arc::new(locator.with_completion(completion.clone())),
          None => Arc::new(locator),
        }
      },
    };

    let documents: Arc<dyn ExtractDocument> = match self.documents {
      Some(documents) => documents,
      None => Arc::new(DocumentExtractor::new(fetcher, &config.locator, config.timeouts.clone())),
    };

    let cache = match self.store {
      Some(store) => ResultCache::new(store, config.cache.ttl()).with_prefix(&config.cache.key_prefix),
      None => ResultCache::from_config(&config.cache).await?,
    };

    let locks = config.concurrency.dedupe_in_flight.then(|| Arc::new(KeyedLocks::new()));
    debug!(
      model = %config.openai.model,
      backend = ?config.cache.backend,
      dedupe = locks.is_some(),
      "Built orchestrator"
    );

    Ok(Orchestrator {
      metadata,
      locator,
      documents,
      extractor,
      cache,
      locks,
      lock_timeout: config.concurrency.lock_timeout(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_build_requires_model_for_default_extractor() {
    let result = Orchestrator::builder()
      .with_config(Config::default().with_cache_backend(CacheBackend::Memory))
      .build()
      .await;
    assert!(matches!(result, Err(EditorialError::Config(msg)) if msg.contains("OPENAI_API_KEY")));
  }

  #[tokio::test]
  async fn test_build_with_key_and_memory_cache() {
    let config = Config::default().with_api_key("sk-test").with_cache_backend(CacheBackend::Memory);
    let orchestrator = Orchestrator::from_config(&config).await.unwrap();
    assert!(orchestrator.locks.is_some());
    assert_eq!(orchestrator.cache.ttl(), Duration::from_secs(168 * 3600));
  }

  #[tokio::test]
  async fn test_bad_url_fails_before_any_stage() {
    let config = Config::default().with_api_key("sk-test").with_cache_backend(CacheBackend::Memory);
    let orchestrator = Orchestrator::from_config(&config).await.unwrap();
    let result = orchestrator.process("https://codeforces.com/contest/1", true).await;
    assert!(matches!(result, Err(EditorialError::UrlParse(_))));
  }

  #[tokio::test]
  async fn test_sqlite_backend_from_config() {
    let dir = tempdir().unwrap();
    let config = Config::default().with_api_key("sk-test").with_cache_path(&dir.path().join("cache.db"));
    let orchestrator = Orchestrator::from_config(&config).await.unwrap();
    assert_eq!(orchestrator.clear_cache().await.unwrap(), 0);
    assert!(dir.path().join("cache.db").exists());
  }
}
