use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per key, created on first use and dropped once idle.
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    locks: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: K) -> KeyedLockGuard<K> {
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;
        KeyedLockGuard {
            key,
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

pub struct KeyedLockGuard<K: Eq + Hash + Clone> {
    key: K,
    locks: Arc<DashMap<K, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedLockGuard<K> {
    fn drop(&mut self) {
        // Release first: an idle mutex is then owned by the map alone.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
