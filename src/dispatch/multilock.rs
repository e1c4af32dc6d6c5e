//! Per-key async locks.
//!
//! [`MultiLock::acquire`] blocks only other acquirers of the same key.
//! Entries are reference counted and dropped from the map once no holder or
//! waiter is left.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type Locks = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

/// A set of named locks, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MultiLock {
    locks: Locks,
}

impl MultiLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the lock named `key`.
    pub async fn acquire(&self, key: &str) -> MultiLockGuard {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key.to_string()).or_default())
        };

        debug!(key, "waiting for lock");
        let guard = entry.lock_owned().await;
        debug!(key, "acquired lock");

        MultiLockGuard {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or waited for.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a key of a [`MultiLock`].
///
/// The lock is released by [`release`](Self::release) or on drop, whichever
/// comes first. Releasing more than once has no effect.
#[derive(Debug)]
pub struct MultiLockGuard {
    key: String,
    locks: Locks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl MultiLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }

    pub fn release(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        drop(guard);

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&self.key);
        }
        debug!(key = %self.key, "released lock");
    }
}

impl Drop for MultiLockGuard {
    fn drop(&mut self) {
        self.release();
    }
}
