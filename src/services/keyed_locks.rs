use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive sections keyed by id. Holders of the same key run one at a time;
/// different keys never contend beyond a shard lookup.
///
/// An entry lives only while someone holds or waits on its key.
pub struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

/// Held section for one key. Dropping it releases the mutex and then removes
/// the key's entry if no other task holds or waits on it.
pub struct KeyedGuard<'a, K: Eq + Hash> {
    locks: &'a DashMap<K, Arc<Mutex<()>>>,
    key: K,
    held: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub async fn acquire(&self, key: K) -> KeyedGuard<'_, K> {
        // Declared before the wait so a cancelled acquire still cleans up
        let mut guard = KeyedGuard {
            locks: &self.locks,
            key: key.clone(),
            held: None,
        };
        // Clone the Arc out so the shard guard is released before awaiting
        let lock = self.locks.entry(key).or_default().clone();
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.held.take());
        // the map's own Arc is the last one once nobody holds or waits
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
