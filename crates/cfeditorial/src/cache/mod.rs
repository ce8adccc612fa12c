//! Result cache with pluggable storage.
//!
//! [`ResultCache`] is the typed view the orchestrator uses: it serializes [`EditorialResult`]s
//! into [`CacheEntry`] JSON documents and enforces expiry itself, so every backend behaves the
//! same way whether or not it supports TTLs natively. Backends only implement [`CacheStore`], a
//! string key-value contract:
//!
//! - [`SqliteStore`]: local file, for a single process
//! - [`RedisStore`]: shared server, for multi-instance deployments
//! - [`MemoryStore`]: in-process map, for tests and ephemeral use
//!
//! # Examples
//!
//! ```no_run
//! # use std::{sync::Arc, time::Duration};
//! # use cfeditorial::{cache::{MemoryStore, ResultCache}, identifier::ProblemIdentifier};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = ResultCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
//! let id = ProblemIdentifier::resolve("https://codeforces.com/contest/1/problem/A")?;
//! if let Some(result) = cache.get(&id).await? {
//!   println!("cached: {}", result.solution_text);
//! }
//! # Ok(())
//! # }
//! ```

use chrono::TimeDelta;

use super::*;

mod kv;
mod memory;
mod sqlite;

pub use self::{kv::RedisStore, memory::MemoryStore, sqlite::SqliteStore};

/// String key-value storage with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
  /// Returns the stored value, or `None` when absent or expired.
  async fn get(&self, key: &str) -> Result<Option<String>>;

  /// Stores a value, replacing any previous one.
  async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

  /// Removes a value. Returns whether one was present.
  async fn delete(&self, key: &str) -> Result<bool>;

  /// Removes every value this application stored. Returns how many were removed.
  async fn clear(&self) -> Result<u64>;
}

/// Stored form of a cached result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  /// Key the entry was stored under.
  pub key:        String,
  /// The cached result.
  pub value:      EditorialResult,
  /// Instant after which the entry is treated as absent.
  pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
  /// Whether the entry is past its expiry.
  pub fn is_expired(&self) -> bool { Utc::now() > self.expires_at }
}

/// Typed cache of extracted results.
#[derive(Clone)]
pub struct ResultCache {
  /// Storage backend.
  store:  Arc<dyn CacheStore>,
  /// Lifetime of new entries.
  ttl:    Duration,
  /// Key prefix.
  prefix: String,
}

impl ResultCache {
  /// Creates a cache over `store`, using the default `editorial_` key prefix.
  pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
    Self { store, ttl, prefix: "editorial_".to_string() }
  }

  /// Sets the key prefix.
  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.prefix = prefix.into();
    self
  }

  /// Opens the backend named by the configuration.
  pub async fn from_config(config: &CacheConfig) -> Result<Self> {
    let store: Arc<dyn CacheStore> = match config.backend {
      CacheBackend::Sqlite => Arc::new(SqliteStore::open(&config.path).await?),
      CacheBackend::Redis => Arc::new(RedisStore::connect(&config.redis_url, &config.key_prefix).await?),
      CacheBackend::Memory => Arc::new(MemoryStore::new()),
    };
    debug!(backend = ?config.backend, "Opened result cache");
    Ok(Self::new(store, config.ttl()).with_prefix(&config.key_prefix))
  }

  /// Lifetime of new entries.
  pub fn ttl(&self) -> Duration { self.ttl }

  /// Key for an identifier.
  pub fn key(&self, identifier: &ProblemIdentifier) -> String {
    identifier.cache_key_with(&self.prefix)
  }

  /// Returns the cached result, if a valid and unexpired entry exists.
  ///
  /// Entries that cannot be decoded or belong to another key are treated as absent.
  pub async fn get(&self, identifier: &ProblemIdentifier) -> Result<Option<EditorialResult>> {
    let key = self.key(identifier);
    let Some(raw) = self.store.get(&key).await? else {
      trace!(%key, "Cache miss");
      return Ok(None);
    };
    let entry = match serde_json::from_str::<CacheEntry>(&raw) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(%key, error = %e, "Ignoring undecodable cache entry");
        return Ok(None);
      },
    };
    if entry.key != key {
      warn!(%key, stored = %entry.key, "Ignoring cache entry stored under another key");
      return Ok(None);
    }
    if entry.is_expired() {
      debug!(%key, "Cache entry expired");
      return Ok(None);
    }
    debug!(%key, "Cache hit");
    Ok(Some(entry.value))
  }

  /// Stores a result for the configured lifetime.
  pub async fn set(&self, identifier: &ProblemIdentifier, result: &EditorialResult) -> Result<()> {
    let key = self.key(identifier);
    let lifetime = TimeDelta::from_std(self.ttl)
      .map_err(|e| EditorialError::Cache(format!("ttl out of range: {e}")))?;
    let entry = CacheEntry { key: key.clone(), value: result.clone(), expires_at: Utc::now() + lifetime };
    self.store.set(&key, &serde_json::to_string(&entry)?, self.ttl).await?;
    debug!(%key, ttl_secs = self.ttl.as_secs(), "Cached result");
    Ok(())
  }

  /// Removes the entry for an identifier. Returns whether one was present.
  pub async fn invalidate(&self, identifier: &ProblemIdentifier) -> Result<bool> {
    self.store.delete(&self.key(identifier)).await
  }

  /// Removes every entry. Returns how many were removed.
  pub async fn clear(&self) -> Result<u64> { self.store.clear().await }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) fn result(problem_id: &str) -> EditorialResult {
    EditorialResult {
      problem_id:       problem_id.to_string(),
      solution_text:    "Answer is ceil(n/a) * ceil(m/a).".to_string(),
      approach:         Some("Math".to_string()),
      algorithm:        None,
      time_complexity:  Some("O(1)".to_string()),
      space_complexity: None,
      code_snippets:    vec![CodeSnippet {
        language:    "cpp".to_string(),
        code:        "int main() {}".to_string(),
        description: None,
      }],
      hints:            vec![],
      notes:            None,
      source_url:       "https://codeforces.com/blog/entry/1".to_string(),
      extracted_at:     Utc::now(),
      ai_model:         "gpt-4o".to_string(),
    }
  }

  #[tokio::test]
  async fn test_round_trip() {
    let cache = ResultCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
    let id = ProblemIdentifier::new("1", "A", false).unwrap();
    assert_eq!(cache.get(&id).await.unwrap(), None);

    let value = result("A");
    cache.set(&id, &value).await.unwrap();
    assert_eq!(cache.get(&id).await.unwrap(), Some(value));

    assert!(cache.invalidate(&id).await.unwrap());
    assert_eq!(cache.get(&id).await.unwrap(), None);
    assert!(!cache.invalidate(&id).await.unwrap());
  }

  #[tokio::test]
  async fn test_expired_entry_is_absent() {
    let store = Arc::new(MemoryStore::new());
    let cache = ResultCache::new(store.clone(), Duration::from_secs(60));
    let id = ProblemIdentifier::new("1", "A", false).unwrap();

    let entry = CacheEntry {
      key:        cache.key(&id),
      value:      result("A"),
      expires_at: Utc::now() - TimeDelta::seconds(1),
    };
    store.set(&entry.key, &serde_json::to_string(&entry).unwrap(), Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get(&id).await.unwrap(), None);
  }

  #[traced_test]
  #[tokio::test]
  async fn test_garbage_entry_is_absent() {
    let store = Arc::new(MemoryStore::new());
    let cache = ResultCache::new(store.clone(), Duration::from_secs(60));
    let id = ProblemIdentifier::new("1", "A", false).unwrap();

    store.set(&cache.key(&id), "not json", Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get(&id).await.unwrap(), None);
    assert!(logs_contain("undecodable"));
  }

  #[tokio::test]
  async fn test_prefix() {
    let cache = ResultCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(60)).with_prefix("cf:");
    let gym = ProblemIdentifier::new("102942", "F", true).unwrap();
    assert_eq!(cache.key(&gym), "cf:gym_102942_F");
  }
}
