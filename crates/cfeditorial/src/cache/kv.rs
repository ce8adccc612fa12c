//! Redis cache backend.

use redis::aio::ConnectionManager;

use super::*;

/// Keys deleted per `SCAN` page when clearing.
const SCAN_COUNT: usize = 100;

/// [`CacheStore`] on a shared Redis server.
///
/// Expiry is delegated to Redis with `SETEX`. [`CacheStore::clear`] only removes keys under the
/// configured prefix, so the server can be shared with other applications.
#[derive(Clone)]
pub struct RedisStore {
  /// Multiplexed, auto-reconnecting connection.
  conn:   ConnectionManager,
  /// Prefix of every key this application writes.
  prefix: String,
}

impl RedisStore {
  /// Upper bound on establishing the connection.
  const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

  /// Connects to the server at `url`.
  pub async fn connect(url: &str, prefix: &str) -> Result<Self> {
    info!(%url, "Connecting to Redis");
    let client = redis::Client::open(url)?;
    let conn = tokio::time::timeout(Self::CONNECT_TIMEOUT, ConnectionManager::new(client))
      .await
      .map_err(|_| EditorialError::Cache(format!("Redis connection to {url} timed out")))??;

    let mut ping = conn.clone();
    redis::cmd("PING").query_async::<String>(&mut ping).await?;
    debug!(%url, "Redis connected");
    Ok(Self { conn, prefix: prefix.to_string() })
  }
}

#[async_trait]
impl CacheStore for RedisStore {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    let mut conn = self.conn.clone();
    Ok(redis::cmd("GET").arg(key).query_async::<Option<String>>(&mut conn).await?)
  }

  async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
    let mut conn = self.conn.clone();
    redis::cmd("SETEX")
      .arg(key)
      .arg(ttl.as_secs().max(1))
      .arg(value)
      .query_async::<()>(&mut conn)
      .await?;
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<bool> {
    let mut conn = self.conn.clone();
    let removed: u64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
    Ok(removed > 0)
  }

  async fn clear(&self) -> Result<u64> {
    let mut conn = self.conn.clone();
    let pattern = match_pattern(&self.prefix);
    let mut cursor: u64 = 0;
    let mut removed = 0;
    loop {
      let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
        .arg(cursor)
        .arg("MATCH")
        .arg(&pattern)
        .arg("COUNT")
        .arg(SCAN_COUNT)
        .query_async(&mut conn)
        .await?;
      if !keys.is_empty() {
        removed += redis::cmd("DEL").arg(&keys).query_async::<u64>(&mut conn).await?;
      }
      if next == 0 {
        break;
      }
      cursor = next;
    }
    debug!(%pattern, removed, "Cleared Redis cache");
    Ok(removed)
  }
}

/// `SCAN MATCH` pattern for every key starting with `prefix`, glob characters taken literally.
fn match_pattern(prefix: &str) -> String {
  let mut pattern = String::with_capacity(prefix.len() + 1);
  for c in prefix.chars() {
    if matches!(c, '*' | '?' | '[' | ']' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('*');
  pattern
}
