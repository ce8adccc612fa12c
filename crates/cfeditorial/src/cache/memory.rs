//! In-memory cache backend.

use tokio::sync::RwLock;

use super::*;

/// In-process [`CacheStore`]. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
  /// Values with their expiry.
  entries: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryStore {
  /// Creates an empty store.
  pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CacheStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    let entries = self.entries.read().await;
    Ok(entries.get(key).filter(|(_, expires_at)| Utc::now() <= *expires_at).map(|(v, _)| v.clone()))
  }

  async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
    let expires_at = TimeDelta::from_std(ttl)
      .ok()
      .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
      .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let mut entries = self.entries.write().await;
    entries.retain(|_, (_, expires)| Utc::now() <= *expires);
    entries.insert(key.to_string(), (value.to_string(), expires_at));
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<bool> {
    Ok(self.entries.write().await.remove(key).is_some())
  }

  async fn clear(&self) -> Result<u64> {
    let mut entries = self.entries.write().await;
    let count = entries.len() as u64;
    entries.clear();
    Ok(count)
  }
}
