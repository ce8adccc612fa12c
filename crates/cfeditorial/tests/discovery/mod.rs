use super::*;

const CONTEST: &str = "https://codeforces.com/contest/2000";
const ANNOUNCEMENT: &str = "https://codeforces.com/blog/entry/132154";
const TUTORIAL: &str = "https://codeforces.com/blog/entry/132175";
const SEARCH: &str = "https://codeforces.com/search?query=contest+2000+tutorial";
const UNRELATED: &str = "https://codeforces.com/blog/entry/99999";

fn locator(fetch: StubFetch, policy: LocatorPolicy) -> TutorialLocator<Arc<StubFetch>> {
  TutorialLocator::new(Arc::new(fetch), policy, TimeoutConfig::default())
}

async fn metadata(fetch: StubFetch, url: &str) -> Result<ProblemMetadata> {
  let identifier = ProblemIdentifier::resolve(url)?;
  ProblemPageParser::new(Arc::new(fetch), TimeoutConfig::default()).fetch(&identifier).await
}

#[tokio::test]
async fn test_problem_page_metadata() -> TestResult<()> {
  let fetch = StubFetch::new().with_html("https://codeforces.com/problemset/problem/1/A", "problem_1A.html");
  let metadata = metadata(fetch, "https://codeforces.com/contest/1/problem/A").await?;

  assert_eq!(metadata.title, "Theatre Square");
  assert_eq!(metadata.contest_name.as_deref(), Some("Codeforces Beta Round 1"));
  assert_eq!(metadata.time_limit.as_deref(), Some("1 second"));
  assert_eq!(metadata.memory_limit.as_deref(), Some("256 megabytes"));
  assert_eq!(metadata.tags, vec!["math", "*1000"]);
  assert!(metadata.description.as_deref().is_some_and(|d| d.contains("flagstones")));
  let materials: Vec<&str> = metadata.editorial_links.iter().map(|l| l.url.as_str()).collect();
  assert_eq!(materials, vec!["https://codeforces.com/blog/entry/20", "https://codeforces.com/blog/entry/21"]);
  Ok(())
}

#[tokio::test]
async fn test_missing_problem() {
  let result = metadata(StubFetch::new(), "https://codeforces.com/contest/99999/problem/Z").await;
  assert!(matches!(result, Err(EditorialError::ProblemNotFound(_))));
}

#[tokio::test]
async fn test_page_without_title() {
  let fetch = StubFetch::new()
    .with_page("https://codeforces.com/problemset/problem/1/A", FetchResponse::html("<html><body>Offline</body></html>"));
  let result = metadata(fetch, "https://codeforces.com/problemset/problem/1/A").await;
  assert!(matches!(result, Err(EditorialError::Parsing(_))));
}

#[tokio::test]
async fn test_direct_tutorial_from_problem_page() -> TestResult<()> {
  let page = StubFetch::new().with_html("https://codeforces.com/problemset/problem/1/A", "problem_1A.html");
  let metadata = metadata(page, "https://codeforces.com/contest/1/problem/A").await?;

  let fetch = Arc::new(StubFetch::new());
  let locator = TutorialLocator::new(fetch.clone(), LocatorPolicy::default(), TimeoutConfig::default());
  let candidates = locator.locate(&metadata).await;

  assert_eq!(candidates.len(), 2);
  assert_eq!(candidates[0].url, "https://codeforces.com/blog/entry/21");
  assert_eq!(candidates[0].signal, Signal::DirectTutorial);
  assert_eq!(candidates[0].confidence, 40);
  assert_eq!(candidates[1].signal, Signal::Announcement);
  // Neither the contest page nor the search are needed.
  assert_eq!(fetch.calls(), 0);
  Ok(())
}

#[tokio::test]
async fn test_tutorial_found_through_announcement() -> TestResult<()> {
  let page = StubFetch::new()
    .with_html("https://codeforces.com/problemset/problem/2000/B", "problem_no_materials.html");
  let metadata = metadata(page, "https://codeforces.com/contest/2000/problem/B").await?;
  assert!(metadata.editorial_links.is_empty());

  let fetch = StubFetch::new()
    .with_html(CONTEST, "contest_2000.html")
    .with_html(ANNOUNCEMENT, "announcement_2000.html")
    .with_html(SEARCH, "search_2000.html");
  let candidates = locator(fetch, LocatorPolicy::default()).locate(&metadata).await;

  let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
  assert_eq!(urls, vec![TUTORIAL, ANNOUNCEMENT]);
  assert_eq!(candidates[0].signal, Signal::DirectTutorial);
  assert_eq!(candidates[0].title.as_deref(), Some("Editorial"));
  Ok(())
}

#[tokio::test]
async fn test_contest_page_rendered_when_sidebar_missing() -> TestResult<()> {
  let page = StubFetch::new()
    .with_html("https://codeforces.com/problemset/problem/2000/B", "problem_no_materials.html");
  let metadata = metadata(page, "https://codeforces.com/contest/2000/problem/B").await?;

  let fetch = Arc::new(
    StubFetch::new()
      .with_page(CONTEST, FetchResponse::html("<html><body><div id=\"sidebar\"></div></body></html>"))
      .with_rendered(CONTEST, FetchResponse::html(fixture("contest_2000.html")))
      .with_html(ANNOUNCEMENT, "announcement_2000.html"),
  );
  let policy = LocatorPolicy { use_search: false, ..LocatorPolicy::default() };
  let candidates = TutorialLocator::new(fetch.clone(), policy, TimeoutConfig::default()).locate(&metadata).await;

  assert_eq!(candidates[0].url, TUTORIAL);
  let contest_requests: Vec<bool> =
    fetch.requests().iter().filter(|r| r.url == CONTEST).map(|r| r.render_js).collect();
  assert_eq!(contest_requests, vec![false, true]);
  let rendered = fetch.requests().into_iter().find(|r| r.render_js).unwrap();
  assert_eq!(rendered.timeout, Duration::from_secs(60));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_search_with_ai_classification() -> TestResult<()> {
  let page = StubFetch::new()
    .with_html("https://codeforces.com/problemset/problem/2000/B", "problem_no_materials.html");
  let metadata = metadata(page, "https://codeforces.com/contest/2000/problem/B").await?;

  let fetch = StubFetch::new()
    .with_html(SEARCH, "search_2000.html")
    .with_html(TUTORIAL, "tutorial_2000.html")
    .with_html(ANNOUNCEMENT, "announcement_2000.html")
    .with_html(UNRELATED, "unrelated_blog.html");
  let completion = StubCompletion::new(|request| {
    let verdict = if request.prompt.contains("Seating in a Bus") { "YES" } else { "NO" };
    Ok(json!({ "verdict": verdict }))
  });
  let policy = LocatorPolicy { use_contest_page: false, ..LocatorPolicy::default() };
  let candidates = locator(fetch, policy).with_completion(completion.clone()).locate(&metadata).await;

  // The unrelated post never reaches the model, the announcement is rejected by it.
  let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
  assert_eq!(urls, vec![TUTORIAL]);
  assert_eq!(candidates[0].signal, Signal::AiConfirmed);
  assert_eq!(candidates[0].confidence, 30);
  assert_eq!(completion.calls(), 2);
  assert!(logs_contain("Search result does not mention the problem"));
  assert!(logs_contain("Candidate rejected by model"));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_unreachable_search_results_are_dropped() -> TestResult<()> {
  let page = StubFetch::new()
    .with_html("https://codeforces.com/problemset/problem/2000/B", "problem_no_materials.html");
  let metadata = metadata(page, "https://codeforces.com/contest/2000/problem/B").await?;

  let fetch = Arc::new(
    StubFetch::new()
      .with_html(SEARCH, "search_2000.html")
      .with_html(TUTORIAL, "tutorial_2000.html")
      .with_html(ANNOUNCEMENT, "announcement_2000.html"),
  );
  let policy = LocatorPolicy { use_contest_page: false, use_ai_fallback: false, ..LocatorPolicy::default() };
  let candidates = TutorialLocator::new(fetch.clone(), policy, TimeoutConfig::default()).locate(&metadata).await;

  let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
  assert_eq!(urls, vec![TUTORIAL, ANNOUNCEMENT]);
  assert!(candidates.iter().all(|c| c.signal == Signal::SearchMatch));
  assert!(logs_contain("Could not fetch search result"));
  // The search page and the three hits it links to.
  assert_eq!(fetch.calls(), 4);
  Ok(())
}

#[tokio::test]
async fn test_search_opens_only_the_first_hits() -> TestResult<()> {
  let page = StubFetch::new()
    .with_html("https://codeforces.com/problemset/problem/2000/B", "problem_no_materials.html");
  let metadata = metadata(page, "https://codeforces.com/contest/2000/problem/B").await?;

  let fetch = Arc::new(
    StubFetch::new()
      .with_html(SEARCH, "search_2000.html")
      .with_html(TUTORIAL, "tutorial_2000.html")
      .with_html(ANNOUNCEMENT, "announcement_2000.html")
      .with_html(UNRELATED, "unrelated_blog.html"),
  );
  let policy =
    LocatorPolicy { use_contest_page: false, use_ai_fallback: false, search_limit: 1, ..LocatorPolicy::default() };
  let candidates = TutorialLocator::new(fetch.clone(), policy, TimeoutConfig::default()).locate(&metadata).await;

  let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
  assert_eq!(urls, vec![TUTORIAL]);
  assert_eq!(fetch.calls(), 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_failing_strategies_yield_no_candidates() -> TestResult<()> {
  let page = StubFetch::new()
    .with_html("https://codeforces.com/problemset/problem/2000/B", "problem_no_materials.html");
  let metadata = metadata(page, "https://codeforces.com/contest/2000/problem/B").await?;

  let candidates = locator(StubFetch::new(), LocatorPolicy::default()).locate(&metadata).await;
  assert!(candidates.is_empty());
  assert!(logs_contain("Contest page strategy failed"));
  assert!(logs_contain("Blog search strategy failed"));
  Ok(())
}

#[tokio::test]
async fn test_tutorial_document_keeps_code() -> TestResult<()> {
  let fetch = StubFetch::new().with_html(TUTORIAL, "tutorial_2000.html");
  let extractor = DocumentExtractor::new(Arc::new(fetch), &LocatorPolicy::default(), TimeoutConfig::default());
  let candidate = TutorialCandidate::new(TUTORIAL, Signal::DirectTutorial, 40);

  let document = extractor.extract(&candidate).await?;
  assert_eq!(document.content_type, ContentKind::Html);
  assert_eq!(document.source_url, TUTORIAL);
  assert!(document.raw_text.contains("2000B - Seating in a Bus"));
  assert!(document.raw_text.contains(
    "```cpp\n#include <bits/stdc++.h>\nusing namespace std;\nint main() {\n    int t; cin >> t;\n    while (t--) {\n        // check neighbours\n    }\n}\n```"
  ));
  assert!(!document.raw_text.contains("Home"));
  assert!(!document.raw_text.contains("Copyright"));
  Ok(())
}

#[tokio::test]
async fn test_rendered_document_when_body_missing() -> TestResult<()> {
  let fetch = Arc::new(
    StubFetch::new()
      .with_page(TUTORIAL, FetchResponse::html("<html><body><div id=\"pageContent\">Loading...</div></body></html>"))
      .with_rendered(TUTORIAL, FetchResponse::html(fixture("tutorial_2000.html"))),
  );
  let extractor = DocumentExtractor::new(fetch.clone(), &LocatorPolicy::default(), TimeoutConfig::default());
  let document = extractor.extract(&TutorialCandidate::new(TUTORIAL, Signal::SearchMatch, 10)).await?;

  assert!(document.raw_text.contains("Numeric String Template"));
  assert_eq!(fetch.calls(), 2);
  Ok(())
}

#[tokio::test]
async fn test_document_not_rendered_outside_render_paths() -> TestResult<()> {
  let fetch = Arc::new(
    StubFetch::new()
      .with_page(TUTORIAL, FetchResponse::html("<html><body><div id=\"pageContent\">Loading...</div></body></html>"))
      .with_rendered(TUTORIAL, FetchResponse::html(fixture("tutorial_2000.html"))),
  );
  let policy = LocatorPolicy { render_js_paths: vec!["/gym/".to_string()], ..LocatorPolicy::default() };
  let extractor = DocumentExtractor::new(fetch.clone(), &policy, TimeoutConfig::default());
  let document = extractor.extract(&TutorialCandidate::new(TUTORIAL, Signal::SearchMatch, 10)).await?;

  assert!(document.raw_text.contains("Loading..."));
  assert_eq!(fetch.calls(), 1);
  Ok(())
}

#[tokio::test]
async fn test_empty_document_is_a_parsing_error() {
  let fetch = StubFetch::new()
    .with_page(TUTORIAL, FetchResponse::html("<html><body><div class=\"ttypography\">  </div></body></html>"));
  let extractor = DocumentExtractor::new(Arc::new(fetch), &LocatorPolicy::default(), TimeoutConfig::default());
  let result = extractor.extract(&TutorialCandidate::new(TUTORIAL, Signal::DirectTutorial, 40)).await;
  assert!(matches!(result, Err(EditorialError::Parsing(_))));
}

#[tokio::test]
async fn test_undecodable_pdf_is_a_parsing_error() {
  let url = "https://codeforces.com/contest/2000/attachments/download/1/editorial.pdf";
  let fetch = StubFetch::new().with_page(url, FetchResponse::pdf(b"%PDF-1.5 truncated".to_vec()));
  let extractor = DocumentExtractor::new(Arc::new(fetch), &LocatorPolicy::default(), TimeoutConfig::default());
  let candidate = TutorialCandidate::new(url, Signal::DirectTutorial, 40);
  assert_eq!(candidate.content_type, ContentKind::Pdf);

  let result = extractor.extract(&candidate).await;
  assert!(result.as_ref().is_err_and(|e| e.error_type() == "ParsingError"), "{result:?}");
}

#[tokio::test]
async fn test_full_pipeline_over_stub_web() -> TestResult<()> {
  let fetch = StubFetch::new()
    .with_html("https://codeforces.com/problemset/problem/2000/B", "problem_no_materials.html")
    .with_html(CONTEST, "contest_2000.html")
    .with_html(ANNOUNCEMENT, "announcement_2000.html")
    .with_html(TUTORIAL, "tutorial_2000.html");
  let completion = StubCompletion::new(|request| {
    if !request.prompt.contains("Problem B") {
      return Ok(json!({ "found": false, "notes": "wrong problem" }));
    }
    Ok(json!({
      "found": true,
      "solution_text": "Keep an array of occupied seats.",
      "approach": "Simulate.",
      "algorithm": "Implementation",
      "time_complexity": "O(n)",
      "space_complexity": "O(n)",
      "code_snippets": [{ "language": "cpp", "code": "int main() {}", "description": null }],
      "hints": ["Only neighbours matter."],
      "notes": null
    }))
  });
  let orchestrator = Orchestrator::builder()
    .with_config(offline_config())
    .with_fetcher(Arc::new(fetch))
    .with_completion(completion.clone())
    .with_store(Arc::new(MemoryStore::new()))
    .build()
    .await?;

  let result = orchestrator.process("https://codeforces.com/contest/2000/problem/b", true).await?;
  assert_eq!(result.problem_id, "B");
  assert_eq!(result.source_url, TUTORIAL);
  assert_eq!(result.ai_model, "stub-model");
  assert_eq!(result.code_snippets[0].language, "cpp");
  assert_eq!(completion.calls(), 1);
  let _: Value = serde_json::to_value(&result)?;
  Ok(())
}
