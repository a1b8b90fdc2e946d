//! Per-record write serialization.
//!
//! The record store has no compare-and-swap, so read-modify-write sequences
//! on the same record are queued behind an async mutex keyed by table and id.
//! This only covers writers inside one process. An entry lives only while
//! someone holds or waits for it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::Table;

type LockMap = DashMap<String, Arc<Mutex<()>>>;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    inner: Arc<LockMap>,
}

/// Exclusive access to one key; dropping it releases the key and forgets it
/// when nobody else is queued.
#[derive(Debug)]
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    map: Arc<LockMap>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds one reference; any other holder is a waiter.
        self.map
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `table/key`; released when the guard drops.
    pub async fn acquire(&self, table: Table, key: &str) -> KeyGuard {
        let key = format!("{table}/{key}");
        let lock = self.inner.entry(key.clone()).or_default().clone();
        KeyGuard {
            guard: Some(lock.lock_owned().await),
            key,
            map: self.inner.clone(),
        }
    }

    /// Number of keys currently locked or awaited.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
