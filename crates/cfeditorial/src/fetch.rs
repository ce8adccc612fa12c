//! Web fetch capability.
//!
//! Pipeline stages never talk to the network directly: they send a [`FetchRequest`] through a
//! [`WebFetch`] implementation. [`HttpFetcher`] is the production implementation on top of
//! `reqwest`; tests supply their own.
//!
//! A fetch only fails for transport problems. HTTP error statuses are returned as ordinary
//! responses so callers can tell a missing page from an unreachable server.

use reqwest::{header, Client, StatusCode};

use super::*;

/// A single page retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
  /// Absolute URL.
  pub url:       String,
  /// Ask for the page after its scripts have run.
  pub render_js: bool,
  /// Upper bound on the whole retrieval.
  pub timeout:   Duration,
}

impl FetchRequest {
  /// Static fetch with a 30 second timeout.
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into(), render_js: false, timeout: Duration::from_secs(30) }
  }

  /// Requests JavaScript rendering.
  pub fn with_render_js(mut self, render_js: bool) -> Self {
    self.render_js = render_js;
    self
  }

  /// Sets the timeout.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Builds a request with the configured stage timeout.
  pub fn for_stage(url: impl Into<String>, render_js: bool, timeouts: &TimeoutConfig) -> Self {
    Self::new(url).with_render_js(render_js).with_timeout(timeouts.fetch(render_js))
  }
}

/// What came back from a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
  /// HTTP status code.
  pub status:       u16,
  /// `Content-Type` header, if any.
  pub content_type: Option<String>,
  /// Raw body.
  pub body:         Vec<u8>,
}

impl FetchResponse {
  /// A `200 OK` HTML response.
  pub fn html(body: impl Into<String>) -> Self {
    Self {
      status:       200,
      content_type: Some("text/html; charset=utf-8".to_string()),
      body:         body.into().into_bytes(),
    }
  }

  /// A `200 OK` PDF response.
  pub fn pdf(body: Vec<u8>) -> Self {
    Self { status: 200, content_type: Some("application/pdf".to_string()), body }
  }

  /// An empty response with the given status.
  pub fn status(status: u16) -> Self { Self { status, ..Default::default() } }

  /// Whether the status is `2xx`.
  pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

  /// Whether the status reports a missing resource.
  pub fn is_not_found(&self) -> bool { self.status == 404 || self.status == 410 }

  /// Body decoded as UTF-8, replacing invalid sequences.
  pub fn text(&self) -> String { String::from_utf8_lossy(&self.body).into_owned() }

  /// Whether the body is a PDF document, by header or by magic bytes.
  pub fn is_pdf(&self) -> bool {
    self.content_type.as_deref().is_some_and(|ct| ct.to_lowercase().contains("application/pdf"))
      || crate::pdf::looks_like_pdf(&self.body)
  }

  /// Turns a non-success status into the matching error.
  ///
  /// Missing resources become [`EditorialError::ProblemNotFound`] only when `missing_is_problem`
  /// is set; every other failure status is a [`EditorialError::Network`] error.
  pub fn error_for_status(self, url: &str, missing_is_problem: bool) -> Result<Self> {
    if self.is_success() {
      Ok(self)
    } else if self.is_not_found() && missing_is_problem {
      Err(EditorialError::ProblemNotFound(url.to_string()))
    } else {
      Err(EditorialError::Network(format!("{url} answered with status {}", self.status)))
    }
  }
}

/// Capability to retrieve web pages.
#[async_trait]
pub trait WebFetch: Send + Sync {
  /// Retrieves a page.
  ///
  /// # Errors
  ///
  /// Returns [`EditorialError::Network`] when the transport failed after the implementation's
  /// own retry budget, including timeouts.
  async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

#[async_trait]
impl<T: WebFetch + ?Sized> WebFetch for Arc<T> {
  async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
    (**self).fetch(request).await
  }
}

/// Body posted to the rendering service.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
  /// Page to render.
  url:      &'a str,
  /// Milliseconds to wait for lazily loaded content.
  wait_for: u64,
}

/// `reqwest`-backed [`WebFetch`] with retries and optional JavaScript rendering.
///
/// Transport errors, `429` and `5xx` statuses are retried with exponential backoff between 2 and
/// 10 seconds. Rendered fetches are delegated to a headless-browser service that accepts
/// `POST {"url": .., "waitFor": ..}` and answers with the rendered HTML.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  /// Shared connection pool.
  client:          Client,
  /// Attempts per fetch.
  retries:         u32,
  /// Wait passed to the rendering service.
  js_wait_ms:      u64,
  /// Rendering service, if any.
  render_endpoint: Option<String>,
  /// Base delay between attempts.
  backoff:         Duration,
}

impl HttpFetcher {
  /// Builds a fetcher from the HTTP settings.
  pub fn new(config: &HttpConfig) -> Result<Self> {
    let client = Client::builder()
      .user_agent(config.user_agent.clone())
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| EditorialError::Config(format!("could not build HTTP client: {e}")))?;
    if config.render_endpoint.is_none() {
      debug!("No rendering service configured, rendered fetches will be static");
    }
    Ok(Self {
      client,
      retries: config.retries.max(1),
      js_wait_ms: config.js_wait_ms,
      render_endpoint: config.render_endpoint.clone(),
      backoff: Duration::from_secs(2),
    })
  }

  /// Sets the base delay between attempts.
  pub fn with_backoff(mut self, backoff: Duration) -> Self {
    self.backoff = backoff;
    self
  }

  /// Delay before the attempt following `attempt`, capped at five times the base.
  fn delay(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1)).min(5);
    self.backoff.saturating_mul(factor)
  }

  /// One attempt, without retries.
  async fn attempt(&self, request: &FetchRequest) -> core::result::Result<FetchResponse, String> {
    let builder = match (&self.render_endpoint, request.render_js) {
      (Some(endpoint), true) => self
        .client
        .post(endpoint)
        .json(&RenderRequest { url: &request.url, wait_for: self.js_wait_ms }),
      (None, true) => {
        warn!(url = %request.url, "Rendering requested but no render_endpoint set, fetching statically");
        self.client.get(&request.url)
      },
      (_, false) => self.client.get(&request.url),
    };

    let response = builder.timeout(request.timeout).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    let content_type = response
      .headers()
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string);
    let body = response.bytes().await.map_err(|e| e.to_string())?;

    Ok(FetchResponse { status: status.as_u16(), content_type, body: body.to_vec() })
  }
}

#[async_trait]
impl WebFetch for HttpFetcher {
  async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
    let mut last_error = String::new();
    for attempt in 1..=self.retries {
      trace!(url = %request.url, render_js = request.render_js, attempt, "Fetching");
      let outcome = tokio::time::timeout(request.timeout, self.attempt(&request))
        .await
        .unwrap_or_else(|_| Err(format!("timed out after {:?}", request.timeout)));

      match outcome {
        Ok(response) if is_retryable(response.status) && attempt < self.retries => {
          warn!(url = %request.url, status = response.status, attempt, "Retryable status");
        },
        Ok(response) => {
          debug!(url = %request.url, status = response.status, bytes = response.body.len(), "Fetched");
          return Ok(response);
        },
        Err(e) => {
          warn!(url = %request.url, attempt, error = %e, "Fetch failed");
          last_error = e;
        },
      }
      if attempt < self.retries {
        tokio::time::sleep(self.delay(attempt)).await;
      }
    }
    Err(EditorialError::Network(format!("{}: {last_error}", request.url)))
  }
}

/// Statuses worth another attempt.
fn is_retryable(status: u16) -> bool {
  StatusCode::from_u16(status)
    .map(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
    .unwrap_or(false)
}
