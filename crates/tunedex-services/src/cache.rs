//! Outcome cache
//!
//! LRU with per-entry TTL, keyed by the normalized input fingerprint. Only
//! successful outcomes belong here; failures are cheap to reproduce and a
//! transient failure must not shadow a later success.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use tunedex_core::models::{CacheKey, Outcome};

struct CachedEntry {
    outcome: Outcome,
    expires_at: Instant,
}

/// TTL-bounded LRU over request outcomes.
pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, CachedEntry>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fetch a live entry, lazily evicting it if the TTL has passed.
    pub async fn get(&self, key: &CacheKey) -> Option<Outcome> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.outcome.clone()),
            Some(_) => {
                entries.pop(key);
                tracing::debug!(key = %key, "Evicted expired cache entry");
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: CacheKey, outcome: Outcome) {
        let entry = CachedEntry {
            outcome,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().await.put(key, entry);
    }

    /// Remove one entry, e.g. when its artifact was reclaimed.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.entries.lock().await.pop(key);
    }

    /// Drop every expired entry. Lazy eviction covers keys that get hit
    /// again; this covers the ones that never do.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
