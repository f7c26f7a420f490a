// src/services/bounded_cache.rs

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

/// Fixed-capacity, thread-safe key/value store with least-recently-used eviction.
///
/// Every hit in `get` moves the entry to the most-recently-used position; a
/// `put` that would exceed capacity evicts exactly the least-recently-used
/// entry. One mutex guards the whole structure.
pub struct BoundedCache<V> {
    entries: Mutex<LruCache<String, V>>,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    // Entries are replaced wholesale, so a poisoned lock still guards a
    // consistent map.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Inserts or replaces `key`. Returns the key evicted to make room, if any.
    pub fn put(&self, key: String, value: V) -> Option<String> {
        let mut entries = self.lock();
        match entries.push(key.clone(), value) {
            Some((old_key, _)) if old_key != key => {
                log::debug!("Cache evicted: {}", old_key);
                Some(old_key)
            }
            _ => None,
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().pop(key).is_some()
    }

    /// Membership test that leaves recency untouched.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

impl<V> fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("BoundedCache")
            .field("size", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}
