use super::*;

const URL: &str = "https://codeforces.com/contest/1/problem/A";

/// Orchestrator over stub stages and a memory store.
struct Harness {
  orchestrator: Orchestrator,
  store:        Arc<MemoryStore>,
  metadata:     Arc<StubMetadata>,
  locator:      Arc<StubLocator>,
  documents:    Arc<StubDocuments>,
  extractor:    Arc<StubExtractor>,
}

async fn harness(candidates: &[&str], failing: &[&str]) -> Harness {
  let store = Arc::new(MemoryStore::new());
  let metadata = StubMetadata::new();
  let locator = StubLocator::new(candidates);
  let documents = StubDocuments::new(failing);
  let extractor = StubExtractor::new();
  let orchestrator = Orchestrator::builder()
    .with_config(offline_config())
    .with_fetcher(Arc::new(StubFetch::new()))
    .with_store(store.clone())
    .with_metadata(metadata.clone())
    .with_locator(locator.clone())
    .with_documents(documents.clone())
    .with_extractor(extractor.clone())
    .build()
    .await
    .unwrap();
  Harness { orchestrator, store, metadata, locator, documents, extractor }
}

#[tokio::test]
async fn test_end_to_end() -> TestResult<()> {
  let identifier = ProblemIdentifier::resolve(URL)?;
  assert_eq!(identifier.contest_id, "1");
  assert_eq!(identifier.problem_id, "A");
  assert!(!identifier.is_gym);

  let h = harness(&["https://codeforces.com/blog/entry/21"], &[]).await;
  let result = h.orchestrator.process(URL, true).await?;
  assert_eq!(result.problem_id, "A");
  assert!(!result.solution_text.is_empty());
  assert_eq!(result.source_url, "https://codeforces.com/blog/entry/21");
  assert!(h.store.get(&identifier.cache_key()).await?.is_some());
  Ok(())
}

#[tokio::test]
async fn test_cache_first() -> TestResult<()> {
  let h = harness(&["https://codeforces.com/blog/entry/21"], &[]).await;
  let first = h.orchestrator.process(URL, true).await?;
  assert_eq!(h.extractor.calls(), 1);

  // Equivalent URL shapes share the cache entry.
  let second = h.orchestrator.process("https://codeforces.ru/problemset/problem/1/A", true).await?;
  assert_eq!(second, first);
  assert_eq!(h.metadata.calls(), 1);
  assert_eq!(h.locator.calls(), 1);
  assert_eq!(h.documents.calls(), 1);
  assert_eq!(h.extractor.calls(), 1);
  Ok(())
}

#[tokio::test]
async fn test_problem_page_fetched_once_with_details() -> TestResult<()> {
  let h = harness(&["https://codeforces.com/blog/entry/21"], &[]).await;
  let (problem, result) = h.orchestrator.process_with_problem(URL, true).await?;
  assert_eq!(problem.title, "Theatre Square");
  assert_eq!(result.problem_id, "A");
  assert_eq!(h.metadata.calls(), 1);

  // A cached result still needs the page for the details, but nothing else.
  let (_, cached) = h.orchestrator.process_with_problem(URL, true).await?;
  assert_eq!(cached, result);
  assert_eq!(h.metadata.calls(), 2);
  assert_eq!(h.extractor.calls(), 1);
  Ok(())
}

#[tokio::test]
async fn test_prepopulated_cache_skips_every_stage() -> TestResult<()> {
  let h = harness(&["https://codeforces.com/blog/entry/21"], &[]).await;
  let identifier = ProblemIdentifier::resolve(URL)?;
  let cached = editorial_result("A", "https://codeforces.com/blog/entry/cached");
  let entry = json!({
    "key": identifier.cache_key(),
    "value": cached,
    "expires_at": Utc::now() + chrono::TimeDelta::hours(1),
  });
  h.store.set(&identifier.cache_key(), &entry.to_string(), Duration::from_secs(3600)).await?;

  let result = h.orchestrator.process(URL, true).await?;
  assert_eq!(result, cached);
  assert_eq!(h.metadata.calls(), 0);
  assert_eq!(h.locator.calls(), 0);
  assert_eq!(h.extractor.calls(), 0);
  Ok(())
}

#[tokio::test]
async fn test_cache_bypass_recomputes() -> TestResult<()> {
  let h = harness(&["https://codeforces.com/blog/entry/21"], &[]).await;
  h.orchestrator.process(URL, true).await?;
  h.orchestrator.process(URL, false).await?;
  assert_eq!(h.extractor.calls(), 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_candidate_fallback() -> TestResult<()> {
  let broken = "https://codeforces.com/blog/entry/broken";
  let good = "https://codeforces.com/blog/entry/good";
  let h = harness(&[broken, good], &[broken]).await;

  let result = h.orchestrator.process(URL, true).await?;
  assert_eq!(result.source_url, good);
  assert_eq!(h.documents.calls(), 2);
  assert_eq!(h.extractor.calls(), 1);
  assert!(logs_contain("Candidate failed, trying next"));
  Ok(())
}

#[tokio::test]
async fn test_no_editorial() -> TestResult<()> {
  let h = harness(&[], &[]).await;
  let result = h.orchestrator.process(URL, true).await;
  assert!(matches!(result, Err(EditorialError::EditorialNotFound(ref id)) if id == "1/A"));
  assert_eq!(result.unwrap_err().error_type(), "EditorialNotFoundError");
  assert_eq!(h.store.clear().await?, 0);
  Ok(())
}

#[tokio::test]
async fn test_every_candidate_failing() -> TestResult<()> {
  let a = "https://codeforces.com/blog/entry/a";
  let b = "https://codeforces.com/blog/entry/b";
  let h = harness(&[a, b], &[a, b]).await;
  let result = h.orchestrator.process(URL, true).await;
  assert!(matches!(result, Err(EditorialError::EditorialNotFound(_))));
  assert_eq!(h.store.clear().await?, 0);
  Ok(())
}

#[tokio::test]
async fn test_invalid_url() {
  let h = harness(&[], &[]).await;
  let result = h.orchestrator.process("https://codeforces.com/contest/1/problem/", true).await;
  assert!(matches!(result, Err(EditorialError::UrlParse(_))));
  assert_eq!(h.metadata.calls(), 0);
}

#[tokio::test]
async fn test_invalidate_and_clear() -> TestResult<()> {
  let h = harness(&["https://codeforces.com/blog/entry/21"], &[]).await;
  h.orchestrator.process(URL, true).await?;
  assert!(h.orchestrator.invalidate(URL).await?);
  assert!(!h.orchestrator.invalidate(URL).await?);

  h.orchestrator.process(URL, true).await?;
  h.orchestrator.process("https://codeforces.com/gym/102942/problem/F", true).await?;
  assert_eq!(h.orchestrator.clear_cache().await?, 2);
  Ok(())
}

/// Store whose every operation fails.
struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
  async fn get(&self, _key: &str) -> Result<Option<String>> {
    Err(EditorialError::Cache("disk on fire".into()))
  }

  async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
    Err(EditorialError::Cache("disk on fire".into()))
  }

  async fn delete(&self, _key: &str) -> Result<bool> { Err(EditorialError::Cache("disk on fire".into())) }

  async fn clear(&self) -> Result<u64> { Err(EditorialError::Cache("disk on fire".into())) }
}

#[traced_test]
#[tokio::test]
async fn test_cache_failures_do_not_fail_requests() -> TestResult<()> {
  let extractor = StubExtractor::new();
  let orchestrator = Orchestrator::builder()
    .with_config(offline_config())
    .with_fetcher(Arc::new(StubFetch::new()))
    .with_store(Arc::new(BrokenStore))
    .with_metadata(StubMetadata::new())
    .with_locator(StubLocator::new(&["https://codeforces.com/blog/entry/21"]))
    .with_documents(StubDocuments::new(&[]))
    .with_extractor(extractor.clone())
    .build()
    .await?;

  let result = orchestrator.process(URL, true).await?;
  assert_eq!(result.problem_id, "A");
  assert!(logs_contain("Cache read failed, treating as miss"));
  assert!(logs_contain("Failed to cache result"));

  let cleared = orchestrator.clear_cache().await;
  assert!(matches!(cleared, Err(EditorialError::Cache(_))));
  Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_extract_once() -> TestResult<()> {
  let h = harness(&["https://codeforces.com/blog/entry/21"], &[]).await;
  let (a, b) = tokio::join!(h.orchestrator.process(URL, true), h.orchestrator.process(URL, true));
  assert_eq!(a?, b?);
  assert_eq!(h.extractor.calls(), 1);
  Ok(())
}

#[tokio::test]
async fn test_model_failure_surfaces_when_nothing_else_worked() -> TestResult<()> {
  let completion = StubCompletion::new(|_| Err(EditorialError::OpenAi("service unavailable".into())));
  let orchestrator = Orchestrator::builder()
    .with_config(offline_config())
    .with_fetcher(Arc::new(StubFetch::new()))
    .with_completion(completion.clone())
    .with_store(Arc::new(MemoryStore::new()))
    .with_metadata(StubMetadata::new())
    .with_locator(StubLocator::new(&["https://codeforces.com/blog/entry/21"]))
    .with_documents(StubDocuments::new(&[]))
    .build()
    .await?;

  let result = orchestrator.process(URL, true).await;
  assert!(matches!(result, Err(EditorialError::OpenAi(_))));
  assert_eq!(completion.calls(), 1);
  Ok(())
}

#[tokio::test]
async fn test_unparseable_answers_surface_as_model_error() -> TestResult<()> {
  let completion =
    StubCompletion::new(|_| Err(EditorialError::MalformedCompletion("completion is not a JSON object".into())));
  let orchestrator = Orchestrator::builder()
    .with_config(offline_config())
    .with_fetcher(Arc::new(StubFetch::new()))
    .with_completion(completion.clone())
    .with_store(Arc::new(MemoryStore::new()))
    .with_metadata(StubMetadata::new())
    .with_locator(StubLocator::new(&["https://codeforces.com/blog/entry/21"]))
    .with_documents(StubDocuments::new(&[]))
    .build()
    .await?;

  let error = orchestrator.process(URL, true).await.unwrap_err();
  assert!(matches!(&error, EditorialError::OpenAi(msg) if msg.contains("not a JSON object")), "{error:?}");
  assert_eq!(error.error_type(), "OpenAIAPIError");
  assert_eq!(completion.calls(), 2);
  Ok(())
}
