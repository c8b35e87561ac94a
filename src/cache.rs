//! In-memory retrieval caches.
//!
//! [`ResultCache`] maps a raw query string to the [`RetrievalResult`] it
//! resolved to. Keys are used verbatim: `"Flu"` and `"flu "` are distinct
//! entries. The cache is bounded by an LRU capacity and, optionally, by a
//! time-to-live per entry. It lives for the process only.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::config::CacheConfig;
use crate::models::RetrievalResult;

struct Entry {
    result: RetrievalResult,
    inserted_at: Instant,
}

pub struct ResultCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Option<Duration>,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let ttl = (config.ttl_secs > 0).then(|| Duration::from_secs(config.ttl_secs));
        Self::new(config.capacity, ttl)
    }

    /// Returns a clone of the cached result, dropping it first if expired.
    pub fn get(&self, query: &str) -> Option<RetrievalResult> {
        let mut entries = self.lock();
        let expired = match entries.get(query) {
            Some(entry) => self.is_expired(entry),
            None => return None,
        };
        if expired {
            entries.pop(query);
            return None;
        }
        entries.get(query).map(|entry| entry.result.clone())
    }

    pub fn insert(&self, query: &str, result: RetrievalResult) {
        self.lock().put(
            query.to_string(),
            Entry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.ttl
            .map(|ttl| entry.inserted_at.elapsed() >= ttl)
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Entry>> {
        // Entries are replaced whole; a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
