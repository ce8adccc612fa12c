//! SQLite cache backend, the default for local use.

use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use super::*;

/// [`CacheStore`] in a local SQLite file.
///
/// Expired rows are never returned, and every write deletes the rows that have expired.
pub struct SqliteStore {
  /// Async SQLite connection handle
  conn: Connection,
}

impl SqliteStore {
  /// Opens an existing cache database or creates a new one, along with its parent directories.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await?;
    }
    debug!("Opening SQLite cache at {}", path.display());
    let conn = Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Opens a cache that lives only as long as the handle.
  pub async fn open_in_memory() -> Result<Self> { Self::init(Connection::open_in_memory().await?).await }

  /// Initializes the schema.
  async fn init(conn: Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/init.sql")))?;
        Ok(())
      })
      .await?;
    Ok(Self { conn })
  }
}

#[async_trait]
impl CacheStore for SqliteStore {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_string();
    let now = Utc::now();
    self
      .conn
      .call(move |conn| {
        let row = conn
          .query_row(
            "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
            params![key],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, DateTime<Utc>>(1)?)),
          )
          .optional()?;
        Ok(row.filter(|(_, expires_at)| now <= *expires_at).map(|(value, _)| value))
      })
      .await
      .map_err(EditorialError::from)
  }

  async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
    let lifetime = TimeDelta::from_std(ttl)
      .map_err(|e| EditorialError::Cache(format!("ttl out of range: {e}")))?;
    let now = Utc::now();
    let expires_at = now + lifetime;
    let (key, value) = (key.to_string(), value.to_string());
    self
      .conn
      .call(move |conn| {
        let purged = conn.execute("DELETE FROM cache_entries WHERE expires_at < ?1", params![now])?;
        if purged > 0 {
          trace!(purged, "Purged expired cache rows");
        }
        conn.execute(
          "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
          params![key, value, expires_at],
        )?;
        Ok(())
      })
      .await
      .map_err(EditorialError::from)
  }

  async fn delete(&self, key: &str) -> Result<bool> {
    let key = key.to_string();
    self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])? > 0))
      .await
      .map_err(EditorialError::from)
  }

  async fn clear(&self) -> Result<u64> {
    self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM cache_entries", [])? as u64))
      .await
      .map_err(EditorialError::from)
  }
}
