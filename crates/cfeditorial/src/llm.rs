//! Language model capability and its OpenAI chat-completions client.
//!
//! The pipeline only ever asks the model for JSON objects, in one of two shapes (see
//! [`ResponseSchema`]). Validation of the returned fields belongs to the caller; this module only
//! guarantees that a successful completion is a JSON object.
//!
//! # Examples
//!
//! ```no_run
//! use cfeditorial::{
//!   config::Config,
//!   llm::{Completion, CompletionRequest, OpenAiClient, ResponseSchema},
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default().with_api_key("sk-...");
//! let client = OpenAiClient::from_config(&config)?;
//! let request = CompletionRequest::new(ResponseSchema::Classification)
//!   .with_system("You answer with JSON.")
//!   .with_prompt("Is this an editorial? {\"verdict\": \"YES\"|\"NO\"}");
//! let value = client.complete(request).await?;
//! println!("{value}");
//! # Ok(())
//! # }
//! ```

use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::*;

/// Shape of the JSON object a completion must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSchema {
  /// `{"verdict": "YES" | "NO" | "PARTIAL"}`
  Classification,
  /// The structured solution fields.
  Solution,
}

/// A prompt plus the shape of the expected answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
  /// System message.
  pub system: String,
  /// User message.
  pub prompt: String,
  /// Expected response shape.
  pub schema: ResponseSchema,
}

impl CompletionRequest {
  /// Empty request for the given response shape.
  pub fn new(schema: ResponseSchema) -> Self {
    Self { system: String::new(), prompt: String::new(), schema }
  }

  /// Sets the system message.
  pub fn with_system(mut self, system: impl Into<String>) -> Self {
    self.system = system.into();
    self
  }

  /// Sets the user message.
  pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
    self.prompt = prompt.into();
    self
  }
}

/// Capability to get structured completions from a language model.
#[async_trait]
pub trait Completion: Send + Sync {
  /// Name of the model answering requests, recorded in every result.
  fn model(&self) -> &str;

  /// Returns the model's answer as a JSON object.
  ///
  /// # Errors
  ///
  /// - [`EditorialError::OpenAi`] when the service is unavailable, times out, or rejects the
  ///   request
  /// - [`EditorialError::MalformedCompletion`] when the answer is not a JSON object
  async fn complete(&self, request: CompletionRequest) -> Result<Value>;
}

#[async_trait]
impl<T: Completion + ?Sized> Completion for Arc<T> {
  fn model(&self) -> &str { (**self).model() }

  async fn complete(&self, request: CompletionRequest) -> Result<Value> {
    (**self).complete(request).await
  }
}

/// Message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  /// `system`, `user` or `assistant`.
  pub role:    String,
  /// Message text.
  pub content: String,
}

impl Message {
  /// Creates a system message.
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: "system".to_string(), content: content.into() }
  }

  /// Creates a user message.
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: "user".to_string(), content: content.into() }
  }
}

/// `response_format` field forcing JSON output.
#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
  /// Always `json_object`.
  #[serde(rename = "type")]
  kind: &'static str,
}

/// Request builder for the chat-completions endpoint.
///
/// ```no_run
/// # use cfeditorial::llm::ChatRequest;
/// let request = ChatRequest::new()
///   .with_model("gpt-4o")
///   .with_system("You answer with JSON.")
///   .with_message("Say hi as {\"greeting\": ...}");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
  /// Model name. Falls back to `gpt-4o` with a warning when unset.
  pub model:       Option<String>,
  /// Conversation so far. Must contain at least one message before sending.
  pub messages:    Vec<Message>,
  /// Sampling temperature.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub temperature: Option<f32>,
  /// Upper bound on generated tokens.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_tokens:  Option<u32>,
  /// Forces a JSON object answer.
  response_format: ResponseFormat,
}

impl Default for ChatRequest {
  fn default() -> Self {
    Self {
      model:           None,
      messages:        Vec::new(),
      temperature:     None,
      max_tokens:      None,
      response_format: ResponseFormat { kind: "json_object" },
    }
  }
}

impl ChatRequest {
  /// Creates an empty request.
  pub fn new() -> Self { Self::default() }

  /// Sets the model.
  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = Some(model.into());
    self
  }

  /// Appends a system message.
  pub fn with_system(mut self, content: impl Into<String>) -> Self {
    self.messages.push(Message::system(content));
    self
  }

  /// Appends a user message.
  pub fn with_message(mut self, content: impl Into<String>) -> Self {
    self.messages.push(Message::user(content));
    self
  }

  /// Sets the sampling temperature.
  pub fn with_temperature(mut self, temperature: f32) -> Self {
    self.temperature = Some(temperature);
    self
  }

  /// Sets the token limit.
  pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
    self.max_tokens = Some(max_tokens);
    self
  }

  /// Fills in defaults and checks the request can be sent.
  fn finalize(mut self) -> Result<Self> {
    if self.model.is_none() {
      warn!("No model set on chat request, falling back to gpt-4o");
      self.model = Some("gpt-4o".to_string());
    }
    if self.messages.iter().all(|m| m.role != "user") {
      return Err(EditorialError::OpenAi("chat request has no user message".into()));
    }
    Ok(self)
  }
}

/// Raw chat-completions response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
  /// Generated choices. Only the first is used.
  choices: Vec<Choice>,
}

/// One generated choice.
#[derive(Debug, Deserialize)]
struct Choice {
  /// The assistant message.
  message: ChoiceMessage,
}

/// The assistant message of a choice.
#[derive(Debug, Deserialize)]
struct ChoiceMessage {
  /// Message text, absent when the model refused.
  content: Option<String>,
}

/// OpenAI-compatible [`Completion`] implementation.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
  /// Shared connection pool.
  http:        Client,
  /// Bearer token.
  api_key:     String,
  /// API base URL.
  base_url:    String,
  /// Model name.
  model:       String,
  /// Upper bound on generated tokens.
  max_tokens:  u32,
  /// Sampling temperature.
  temperature: f32,
  /// Attempts per completion.
  retries:     u32,
  /// Upper bound on one attempt.
  timeout:     Duration,
  /// Base delay between attempts.
  backoff:     Duration,
}

impl OpenAiClient {
  /// Creates a client from the configuration.
  ///
  /// # Errors
  ///
  /// Returns [`EditorialError::Config`] when no API key is configured.
  pub fn from_config(config: &Config) -> Result<Self> {
    let api_key = config
      .openai
      .api_key
      .clone()
      .filter(|k| !k.trim().is_empty())
      .ok_or_else(|| EditorialError::Config("OPENAI_API_KEY is not set".into()))?;
    Ok(Self {
      http: Client::new(),
      api_key,
      base_url: config.openai.base_url.trim_end_matches('/').to_string(),
      model: config.openai.model.clone(),
      max_tokens: config.openai.max_tokens,
      temperature: config.openai.temperature,
      retries: config.openai.retries.max(1),
      timeout: config.timeouts.ai(),
      backoff: Duration::from_secs(2),
    })
  }

  /// Sets the base delay between attempts.
  pub fn with_backoff(mut self, backoff: Duration) -> Self {
    self.backoff = backoff;
    self
  }

  /// Sends a chat request once and returns the assistant's text.
  ///
  /// The error flag tells whether another attempt could succeed.
  async fn send(&self, request: &ChatRequest) -> core::result::Result<String, (bool, String)> {
    let response = self
      .http
      .post(format!("{}/chat/completions", self.base_url))
      .bearer_auth(&self.api_key)
      .json(request)
      .send()
      .await
      .map_err(|e| (true, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
      return Err((retryable, format!("status {status}: {body}")));
    }

    let chat: ChatResponse = response.json().await.map_err(|e| (true, e.to_string()))?;
    chat
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| (false, "response has no message content".to_string()))
  }
}

#[async_trait]
impl Completion for OpenAiClient {
  fn model(&self) -> &str { &self.model }

  async fn complete(&self, request: CompletionRequest) -> Result<Value> {
    let chat = ChatRequest::new()
      .with_model(&self.model)
      .with_system(request.system)
      .with_message(request.prompt)
      .with_temperature(self.temperature)
      .with_max_tokens(self.max_tokens)
      .finalize()?;

    let start = std::time::Instant::now();
    let mut last_error = String::new();
    for attempt in 1..=self.retries {
      let outcome = tokio::time::timeout(self.timeout, self.send(&chat))
        .await
        .unwrap_or_else(|_| Err((true, format!("timed out after {:?}", self.timeout))));
      match outcome {
        Ok(content) => {
          debug!(
            model = %self.model,
            schema = ?request.schema,
            duration_ms = start.elapsed().as_millis(),
            "Chat completion"
          );
          return parse_json_object(&content);
        },
        Err((retryable, e)) => {
          warn!(model = %self.model, attempt, error = %e, "Chat completion failed");
          last_error = e;
          if !retryable {
            break;
          }
        },
      }
      if attempt < self.retries {
        tokio::time::sleep(self.backoff.saturating_mul(attempt)).await;
      }
    }
    Err(EditorialError::OpenAi(last_error))
  }
}

/// Parses a completion into a JSON object, tolerating a surrounding code fence.
pub fn parse_json_object(content: &str) -> Result<Value> {
  let trimmed = content.trim();
  let unfenced = trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
    .and_then(|rest| rest.trim_end().strip_suffix("```"))
    .unwrap_or(trimmed);

  match serde_json::from_str::<Value>(unfenced.trim()) {
    Ok(value) if value.is_object() => Ok(value),
    Ok(_) => Err(EditorialError::MalformedCompletion("completion is not a JSON object".into())),
    Err(e) => Err(EditorialError::MalformedCompletion(format!("completion is not valid JSON: {e}"))),
  }
}
