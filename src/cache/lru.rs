//! Bounded, time-limited result cache with least-recently-used eviction.
//!
//! Both `get` and `put` refresh an entry's recency.  Every entry expires a
//! fixed TTL after the `put` that stored it; expired entries read as absent
//! and are dropped on the lookup that finds them.  Failures are never cached.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ::lru::LruCache;
use tokio::time::Instant;
use tracing::trace;

use crate::model::{FileContent, Tree};

/// A cached resolution.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Tree(Arc<Tree>),
    File(Arc<FileContent>),
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
}

/// Shared handle; clones refer to the same underlying map.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Mutex<LruCache<String, CacheEntry>>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        // A panic while holding the lock cannot leave an entry half-written:
        // every mutation is a single `LruCache` call.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up `key`, refreshing its recency on a hit.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let mut cache = self.lock();
        match cache.get(key) {
            None => return None,
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }
        cache.pop(key);
        trace!(key, "expired cache entry purged");
        None
    }

    /// Store `value` under `key`, replacing any previous value and resetting
    /// its TTL.  At capacity the least recently used entry is evicted.
    pub fn put(&self, key: impl Into<String>, value: CachedValue) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        let evicted = self.lock().push(key.clone(), entry);
        if let Some((old_key, _)) = evicted.filter(|(old_key, _)| *old_key != key) {
            trace!(key = %old_key, "evicted least recently used cache entry");
        }
    }

    pub fn get_tree(&self, key: &str) -> Option<Arc<Tree>> {
        match self.get(key)? {
            CachedValue::Tree(tree) => Some(tree),
            CachedValue::File(_) => None,
        }
    }

    pub fn get_file(&self, key: &str) -> Option<Arc<FileContent>> {
        match self.get(key)? {
            CachedValue::File(file) => Some(file),
            CachedValue::Tree(_) => None,
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}
