//! Immutable process configuration.
//!
//! A [`Config`] is built once (from a TOML file, environment overrides, or in code) and handed to
//! every component constructor. Nothing in the library reads configuration from global state.
//!
//! ```toml
//! [openai]
//! model = "gpt-4o"
//!
//! [cache]
//! backend = "redis"
//! redis_url = "redis://localhost:6379/0"
//! ttl_hours = 24
//! ```

use super::*;

/// Default configuration document written by `cfeditorial init`.
pub const DEFAULT_CONFIG: &str =
  include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config/cfeditorial.toml"));

/// Complete configuration for the editorial pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Language model settings.
  pub openai:      OpenAiConfig,
  /// Web fetch settings.
  pub http:        HttpConfig,
  /// Per-stage timeouts.
  pub timeouts:    TimeoutConfig,
  /// Result cache settings.
  pub cache:       CacheConfig,
  /// In-flight deduplication settings.
  pub concurrency: ConcurrencyConfig,
  /// Tutorial discovery ranking policy.
  pub locator:     LocatorPolicy,
  /// Log output settings, consumed by the command line front end.
  pub logging:     LoggingConfig,
}

/// Settings for the OpenAI-compatible chat completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
  /// Secret key. Only required for live runs.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub api_key:     Option<String>,
  /// Model name sent with every completion.
  pub model:       String,
  /// Base URL of the API, without the trailing `/chat/completions`.
  pub base_url:    String,
  /// Upper bound on tokens generated per completion.
  pub max_tokens:  u32,
  /// Sampling temperature.
  pub temperature: f32,
  /// Attempts per completion for transport-level failures.
  pub retries:     u32,
}

impl Default for OpenAiConfig {
  fn default() -> Self {
    Self {
      api_key:     None,
      model:       "gpt-4o".to_string(),
      base_url:    "https://api.openai.com/v1".to_string(),
      max_tokens:  8000,
      temperature: 0.0,
      retries:     3,
    }
  }
}

/// Settings for the HTTP fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  /// Connect and read timeout of a single attempt.
  pub timeout_secs:    u64,
  /// Attempts per fetch for transport errors and retryable statuses.
  pub retries:         u32,
  /// How long the rendering service waits for lazily loaded content.
  pub js_wait_ms:      u64,
  /// `User-Agent` header value.
  pub user_agent:      String,
  /// Headless-browser rendering service. Rendered fetches fall back to static fetches when unset.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub render_endpoint: Option<String>,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      timeout_secs:    30,
      retries:         3,
      js_wait_ms:      5000,
      user_agent:      format!("cfeditorial/{}", env!("CARGO_PKG_VERSION")),
      render_endpoint: None,
    }
  }
}

/// Upper bounds on each pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
  /// Static page fetches.
  pub fetch_secs:  u64,
  /// JavaScript-rendered page fetches.
  pub render_secs: u64,
  /// Language model completions.
  pub ai_secs:     u64,
}

impl Default for TimeoutConfig {
  fn default() -> Self { Self { fetch_secs: 30, render_secs: 60, ai_secs: 120 } }
}

impl TimeoutConfig {
  /// Timeout for a fetch, depending on whether it is rendered.
  pub fn fetch(&self, render_js: bool) -> Duration {
    Duration::from_secs(if render_js { self.render_secs } else { self.fetch_secs })
  }

  /// Timeout for a single completion.
  pub fn ai(&self) -> Duration { Duration::from_secs(self.ai_secs) }
}

/// Which store backs the result cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// Local SQLite file, for single-process use.
  #[default]
  Sqlite,
  /// Shared Redis server, for multi-instance deployments.
  Redis,
  /// Process memory only.
  Memory,
}

impl FromStr for CacheBackend {
  type Err = EditorialError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      "sqlite" | "file" => Ok(Self::Sqlite),
      "redis" => Ok(Self::Redis),
      "memory" => Ok(Self::Memory),
      other => Err(EditorialError::Config(format!("unknown cache backend '{other}'"))),
    }
  }
}

impl Display for CacheBackend {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::Sqlite => "sqlite",
      Self::Redis => "redis",
      Self::Memory => "memory",
    })
  }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Backend selection.
  pub backend:    CacheBackend,
  /// SQLite database file.
  pub path:       PathBuf,
  /// Redis connection string.
  pub redis_url:  String,
  /// Lifetime of a stored result.
  pub ttl_hours:  u64,
  /// Prefix shared by every key this application writes.
  pub key_prefix: String,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend:    CacheBackend::default(),
      path:       Self::default_path(),
      redis_url:  "redis://localhost:6379/0".to_string(),
      ttl_hours:  168,
      key_prefix: "editorial_".to_string(),
    }
  }
}

impl CacheConfig {
  /// Longest accepted result lifetime, ten years.
  pub const MAX_TTL_HOURS: u64 = 24 * 365 * 10;

  /// Returns the default location of the SQLite cache.
  ///
  /// - On Unix: `~/.cache/cfeditorial/cache.db`
  /// - On macOS: `~/Library/Caches/cfeditorial/cache.db`
  /// - On Windows: `%LOCALAPPDATA%\cfeditorial\cache.db`
  /// - Fallback: `./cfeditorial/cache.db`
  pub fn default_path() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("cfeditorial").join("cache.db")
  }

  /// Lifetime of a stored result.
  pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_hours.saturating_mul(3600)) }

  /// Where the selected backend keeps its entries.
  pub fn location(&self) -> String {
    match self.backend {
      CacheBackend::Sqlite => self.path.display().to_string(),
      CacheBackend::Redis => self.redis_url.clone(),
      CacheBackend::Memory => "process memory".to_string(),
    }
  }
}

/// Deduplication of concurrent requests for the same problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
  /// Allow at most one in-flight extraction per problem.
  pub dedupe_in_flight:  bool,
  /// Upper bound on waiting for another request's extraction.
  pub lock_timeout_secs: u64,
}

impl Default for ConcurrencyConfig {
  fn default() -> Self { Self { dedupe_in_flight: true, lock_timeout_secs: 300 } }
}

impl ConcurrencyConfig {
  /// Upper bound on waiting for another request's extraction.
  pub fn lock_timeout(&self) -> Duration { Duration::from_secs(self.lock_timeout_secs) }
}

/// Confidence weight attached to each discovery signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
  /// A link labelled as a tutorial in the contest materials.
  pub direct_tutorial: u8,
  /// A candidate the language model judged plausible.
  pub ai_confirmed:    u8,
  /// A contest announcement.
  pub announcement:    u8,
  /// A blog search hit.
  pub search_match:    u8,
}

impl Default for SignalWeights {
  fn default() -> Self {
    Self { direct_tutorial: 40, ai_confirmed: 30, announcement: 20, search_match: 10 }
  }
}

/// Tunable policy for the tutorial locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorPolicy {
  /// Link text that marks a tutorial. Compared case-insensitively.
  pub tutorial_keywords:     Vec<String>,
  /// Link text that marks a contest announcement. Compared case-insensitively.
  pub announcement_keywords: Vec<String>,
  /// Classify candidates with the model when none reaches this confidence.
  pub ai_fallback_below:     u8,
  /// Search results considered.
  pub search_limit:          usize,
  /// Announcements opened to look for tutorial links.
  pub follow_announcements:  usize,
  /// Candidates returned after ranking.
  pub max_candidates:        usize,
  /// Paths whose pages only render their content with JavaScript.
  pub render_js_paths:       Vec<String>,
  /// Look at the problem page's contest materials.
  pub use_problem_page:      bool,
  /// Look at the contest page's contest materials.
  pub use_contest_page:      bool,
  /// Open announcements to find tutorial links.
  pub use_announcements:     bool,
  /// Run a blog search.
  pub use_search:            bool,
  /// Classify weak candidates with the model.
  pub use_ai_fallback:       bool,
  /// Confidence per signal.
  pub weights:               SignalWeights,
}

impl Default for LocatorPolicy {
  fn default() -> Self {
    Self {
      tutorial_keywords:     ["tutorial", "editorial", "разбор", "solutions", "analysis"]
        .map(String::from)
        .to_vec(),
      announcement_keywords: ["announcement", "анонс"].map(String::from).to_vec(),
      ai_fallback_below:     40,
      search_limit:          3,
      follow_announcements:  2,
      max_candidates:        8,
      render_js_paths:       ["/blog/", "/contest/", "/gym/"].map(String::from).to_vec(),
      use_problem_page:      true,
      use_contest_page:      true,
      use_announcements:     true,
      use_search:            true,
      use_ai_fallback:       true,
      weights:               SignalWeights::default(),
    }
  }
}

impl LocatorPolicy {
  /// Whether the text names a tutorial.
  pub fn is_tutorial(&self, text: &str) -> bool { contains_any(text, &self.tutorial_keywords) }

  /// Whether the text names a contest announcement.
  pub fn is_announcement(&self, text: &str) -> bool {
    contains_any(text, &self.announcement_keywords)
  }

  /// Whether a page at this URL needs JavaScript rendering to show its content.
  pub fn needs_render(&self, url: &str) -> bool {
    self.render_js_paths.iter().any(|path| url.contains(path.as_str()))
  }
}

/// Case-insensitive keyword match.
fn contains_any(text: &str, keywords: &[String]) -> bool {
  let text = text.to_lowercase();
  keywords.iter().any(|k| text.contains(&k.to_lowercase()))
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Filter directive used when neither `RUST_LOG` nor `-v` is given.
  pub level: String,
  /// Write logs to this file instead of stderr.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file:  Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self { Self { level: "info".to_string(), file: None } }
}

impl Config {
  /// Returns the default configuration file location.
  ///
  /// - On Unix: `~/.config/cfeditorial/config.toml`
  /// - On macOS: `~/Library/Application Support/cfeditorial/config.toml`
  /// - On Windows: `%APPDATA%\cfeditorial\config.toml`
  /// - Fallback: `./cfeditorial/config.toml`
  pub fn default_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("cfeditorial").join("config.toml")
  }

  /// Loads a configuration file, applies environment overrides and validates the result.
  ///
  /// A missing file is not an error: defaults are used instead.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let config = if path.exists() {
      debug!("Loading configuration from {}", path.display());
      Self::from_toml(&std::fs::read_to_string(path)?)?
    } else {
      debug!("No configuration at {}, using defaults", path.display());
      Self::default()
    };
    let config = config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
  }

  /// Parses a TOML document. Missing keys take their defaults.
  pub fn from_toml(content: &str) -> Result<Self> { Ok(toml::from_str(content)?) }

  /// Serializes to a TOML document.
  pub fn to_toml(&self) -> Result<String> { Ok(toml::to_string_pretty(self)?) }

  /// Writes the configuration to `path`, creating parent directories.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, self.to_toml()?)?;
    Ok(())
  }

  /// Applies the supported environment overrides.
  ///
  /// The lookup is passed in so tests never touch the process environment.
  pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
      self.openai.api_key = Some(key);
    }
    if let Some(model) = lookup("OPENAI_MODEL").filter(|v| !v.is_empty()) {
      self.openai.model = model;
    }
    if let Some(backend) = lookup("CFEDITORIAL_CACHE_BACKEND") {
      self.cache.backend = backend.parse()?;
    }
    if let Some(url) = lookup("CFEDITORIAL_REDIS_URL").filter(|v| !v.is_empty()) {
      self.cache.redis_url = url;
    }
    if let Some(hours) = lookup("CFEDITORIAL_CACHE_TTL_HOURS") {
      self.cache.ttl_hours = hours.trim().parse().map_err(|_| {
        EditorialError::Config(format!("CFEDITORIAL_CACHE_TTL_HOURS is not a number: '{hours}'"))
      })?;
    }
    Ok(self)
  }

  /// Rejects configurations no pipeline run could succeed with.
  pub fn validate(&self) -> Result<()> {
    if self.openai.model.trim().is_empty() {
      return Err(EditorialError::Config("openai.model must not be empty".into()));
    }
    if self.cache.ttl_hours == 0 {
      return Err(EditorialError::Config("cache.ttl_hours must be positive".into()));
    }
    if self.cache.ttl_hours > CacheConfig::MAX_TTL_HOURS {
      return Err(EditorialError::Config(format!(
        "cache.ttl_hours must be at most {}",
        CacheConfig::MAX_TTL_HOURS
      )));
    }
    let timeouts = [
      ("http.timeout_secs", self.http.timeout_secs),
      ("timeouts.fetch_secs", self.timeouts.fetch_secs),
      ("timeouts.render_secs", self.timeouts.render_secs),
      ("timeouts.ai_secs", self.timeouts.ai_secs),
      ("concurrency.lock_timeout_secs", self.concurrency.lock_timeout_secs),
    ];
    if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
      return Err(EditorialError::Config(format!("{name} must be positive")));
    }
    Ok(())
  }

  /// Sets the language model.
  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.openai.model = model.into();
    self
  }

  /// Sets the API key.
  pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
    self.openai.api_key = Some(key.into());
    self
  }

  /// Sets the cache backend.
  pub fn with_cache_backend(mut self, backend: CacheBackend) -> Self {
    self.cache.backend = backend;
    self
  }

  /// Sets the SQLite cache location.
  pub fn with_cache_path(mut self, path: &Path) -> Self {
    self.cache.path = path.to_path_buf();
    self
  }

  /// Sets the locator policy.
  pub fn with_locator(mut self, policy: LocatorPolicy) -> Self {
    self.locator = policy;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_mirror_documented_values() {
    let config = Config::default();
    assert_eq!(config.openai.model, "gpt-4o");
    assert_eq!(config.openai.max_tokens, 8000);
    assert_eq!(config.cache.ttl_hours, 168);
    assert_eq!(config.cache.redis_url, "redis://localhost:6379/0");
    assert_eq!(config.http.js_wait_ms, 5000);
    assert_eq!(config.locator.weights.direct_tutorial, 40);
    assert!(config.concurrency.dedupe_in_flight);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_toml_keeps_defaults() {
    let config = Config::from_toml(
      r#"
      [cache]
      backend = "redis"
      ttl_hours = 24

      [locator.weights]
      search_match = 5
      "#,
    )
    .unwrap();
    assert_eq!(config.cache.backend, CacheBackend::Redis);
    assert_eq!(config.cache.ttl(), Duration::from_secs(24 * 3600));
    assert_eq!(config.locator.weights.search_match, 5);
    assert_eq!(config.locator.weights.announcement, 20);
    assert_eq!(config.openai.model, "gpt-4o");
  }

  #[test]
  fn test_default_document_parses() {
    let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.openai.model, Config::default().openai.model);
  }

  #[test]
  fn test_env_overrides() {
    let env: HashMap<&str, &str> = HashMap::from([
      ("OPENAI_API_KEY", "sk-test"),
      ("OPENAI_MODEL", "gpt-4o-mini"),
      ("CFEDITORIAL_CACHE_BACKEND", "memory"),
      ("CFEDITORIAL_CACHE_TTL_HOURS", "2"),
    ]);
    let config =
      Config::default().apply_env(|name| env.get(name).map(|v| v.to_string())).unwrap();
    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.openai.model, "gpt-4o-mini");
    assert_eq!(config.cache.backend, CacheBackend::Memory);
    assert_eq!(config.cache.ttl_hours, 2);
  }

  #[test]
  fn test_backend_names() {
    for backend in [CacheBackend::Sqlite, CacheBackend::Redis, CacheBackend::Memory] {
      assert_eq!(backend.to_string().parse::<CacheBackend>().unwrap(), backend);
    }
    let cache = CacheConfig { backend: CacheBackend::Redis, ..CacheConfig::default() };
    assert_eq!(cache.location(), "redis://localhost:6379/0");
  }

  #[test]
  fn test_bad_env_override() {
    let result = Config::default()
      .apply_env(|name| (name == "CFEDITORIAL_CACHE_BACKEND").then(|| "etcd".to_string()));
    assert!(matches!(result, Err(EditorialError::Config(_))));
  }

  #[test]
  fn test_validation_rejects_zeroes() {
    let mut config = Config::default();
    config.timeouts.ai_secs = 0;
    assert!(matches!(config.validate(), Err(EditorialError::Config(msg)) if msg.contains("ai_secs")));

    let mut config = Config::default();
    config.cache.ttl_hours = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.cache.ttl_hours = u64::MAX;
    assert!(matches!(config.validate(), Err(EditorialError::Config(msg)) if msg.contains("at most")));
    assert_eq!(config.cache.ttl(), Duration::from_secs(u64::MAX));
    config.cache.ttl_hours = CacheConfig::MAX_TTL_HOURS;
    assert!(config.validate().is_ok());

    let config = Config::default().with_model("  ");
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config::default().with_cache_backend(CacheBackend::Memory).with_model("gpt-4.1");
    config.save(&path).unwrap();

    let loaded = Config::from_toml(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, config);
  }

  #[test]
  fn test_keyword_matching() {
    let policy = LocatorPolicy::default();
    assert!(policy.is_tutorial("Codeforces Round #1 Editorial"));
    assert!(policy.is_tutorial("Разбор задач"));
    assert!(policy.is_announcement("Announcement of Codeforces Round 1"));
    assert!(!policy.is_tutorial("Announcement"));
    assert!(policy.needs_render("https://codeforces.com/blog/entry/1"));
  }
}
