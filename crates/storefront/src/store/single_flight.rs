//! Per-key serialization of mutations.
//!
//! Two mutations against the same cart product, order or payment must not
//! race on completion order. Each key gets a fair (FIFO) async mutex, so
//! operations on one entity run one at a time in issue order while
//! operations on different entities proceed concurrently.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async locks indexed by key.
///
/// Entries exist only while a lock is held or awaited.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Hash + Eq + Clone> KeyedLocks<K> {
    /// Create an empty lock set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other operation holds `key`, then hold it until the
    /// returned guard is dropped.
    pub async fn lock(&self, key: K) -> KeyGuard<'_, K> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        let guard = mutex.lock_owned().await;

        KeyGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Whether an operation currently holds or awaits `key`.
    #[must_use]
    pub fn is_busy(&self, key: &K) -> bool {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn release(&self, key: &K, guard: OwnedMutexGuard<()>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Map entry plus this guard: nobody else is waiting.
        if Arc::strong_count(OwnedMutexGuard::mutex(&guard)) == 2 {
            locks.remove(key);
        }
        drop(guard);
    }
}

/// Holds one key of a [`KeyedLocks`] until dropped.
#[must_use = "the key is released as soon as the guard is dropped"]
pub struct KeyGuard<'a, K: Hash + Eq + Clone> {
    locks: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Hash + Eq + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            self.locks.release(&self.key, guard);
        }
    }
}
