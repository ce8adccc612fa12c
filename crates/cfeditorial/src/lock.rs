//! Per-key in-flight locks.
//!
//! Two requests for the same problem would otherwise both pay for a full extraction. The
//! orchestrator holds a [`KeyGuard`] for the problem's cache key while it works, so the second
//! request waits and then finds the first one's result in the cache.

use std::sync::{Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::*;

/// Registry of locks keyed by string.
///
/// Entries exist only while some request holds or waits for them.
#[derive(Debug, Default)]
pub struct KeyedLocks {
  /// Live locks by key.
  locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
  /// Creates an empty registry.
  pub fn new() -> Self { Self::default() }

  /// Waits up to `timeout` for the lock on `key`.
  ///
  /// Returns `None` when the wait times out; the caller then proceeds without the lock.
  pub async fn acquire(self: &Arc<Self>, key: &str, timeout: Duration) -> Option<KeyGuard> {
    let mutex = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      locks.entry(key.to_string()).or_default().clone()
    };

    let mut guard = KeyGuard { registry: self.clone(), key: key.to_string(), mutex, held: None };
    match tokio::time::timeout(timeout, guard.mutex.clone().lock_owned()).await {
      Ok(held) => {
        trace!(%key, "Acquired in-flight lock");
        guard.held = Some(held);
        Some(guard)
      },
      Err(_) => {
        warn!(%key, timeout_secs = timeout.as_secs(), "Timed out waiting for in-flight lock");
        None
      },
    }
  }

  /// Number of keys currently locked or awaited.
  pub fn len(&self) -> usize { self.locks.lock().unwrap_or_else(PoisonError::into_inner).len() }

  /// Whether no key is locked or awaited.
  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Holds the lock on one key. Dropping it releases the lock, including on cancellation.
#[derive(Debug)]
pub struct KeyGuard {
  /// Registry the lock belongs to.
  registry: Arc<KeyedLocks>,
  /// Locked key.
  key:      String,
  /// The key's mutex, kept to tell whether others still use it.
  mutex:    Arc<AsyncMutex<()>>,
  /// The held lock, if acquired.
  held:     Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
  fn drop(&mut self) {
    self.held.take();
    let mut locks = self.registry.locks.lock().unwrap_or_else(PoisonError::into_inner);
    // Registry entry plus this guard: nobody else is waiting.
    if Arc::strong_count(&self.mutex) == 2 {
      locks.remove(&self.key);
    }
    trace!(key = %self.key, "Released in-flight lock");
  }
}
