//! Per-session advisory locks.
//!
//! Two concurrent turns on the same session token would both read the same
//! prior transcript, both append, and the later write would win, silently
//! dropping a turn. Serialising the read-modify-write per token closes that
//! race without any cross-session contention.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex as StdMutex},
};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Prune idle entries once the registry grows past this many tokens.
const PRUNE_THRESHOLD: usize = 1024;

/// Token-keyed async mutex registry. Cheap to clone.
#[derive(Clone, Default)]
pub struct SessionLocks {
  inner: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
  pub fn new() -> Self { Self::default() }

  /// Acquire the lock for `token`, waiting if another turn holds it.
  /// The guard is released on drop.
  pub async fn acquire(&self, token: &str) -> OwnedMutexGuard<()> {
    let entry = {
      let mut map = self.inner.lock().expect("lock registry poisoned");
      if map.len() > PRUNE_THRESHOLD {
        // Strong count 1 means only the registry holds the mutex: idle.
        map.retain(|_, m| Arc::strong_count(m) > 1);
      }
      map.entry(token.to_owned()).or_default().clone()
    };
    entry.lock_owned().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tokio::time::timeout;

  #[tokio::test]
  async fn same_token_serialises() {
    let locks = SessionLocks::new();
    let guard = locks.acquire("tok-a").await;

    let blocked = timeout(Duration::from_millis(20), locks.acquire("tok-a")).await;
    assert!(blocked.is_err(), "second acquire should wait");

    drop(guard);
    let reacquired = timeout(Duration::from_millis(20), locks.acquire("tok-a")).await;
    assert!(reacquired.is_ok());
  }

  #[tokio::test]
  async fn different_tokens_are_independent() {
    let locks = SessionLocks::new();
    let _a = locks.acquire("tok-a").await;
    let b = timeout(Duration::from_millis(20), locks.acquire("tok-b")).await;
    assert!(b.is_ok());
  }
}
