//! Time-boxed in-memory cache.
//!
//! [`TtlCache`] maps string keys to values stamped with the instant they were
//! stored. A read at or after `stored_at + ttl` is a miss and removes the
//! entry. There is no size bound or LRU policy; the keyspace is one entry per
//! document × resource type × lookback window.
//!
//! The cache itself is not synchronized. The owner decides the locking
//! discipline (see [`DocsClient`](crate::client::DocsClient), which keeps it
//! behind a `Mutex`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Source of monotonic time for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock backed [`Clock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct CacheEntry<V> {
    stored_at: Instant,
    value: V,
}

/// Key/value store with expiry-on-read.
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache whose entries live for `ttl_seconds`.
    pub fn new(ttl_seconds: u64) -> Self {
        Self::with_clock(ttl_seconds, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a copy of the value for `key` if it has not expired.
    ///
    /// An expired entry is evicted as part of the lookup.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.stored_at) >= self.ttl,
        };

        if expired {
            self.entries.remove(key);
            debug!(key, "cache expired");
            return None;
        }

        debug!(key, "cache hit");
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` under `key`, stamped with the current time.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        debug!(key = %key, "cache set");
        self.entries.insert(
            key,
            CacheEntry {
                stored_at: self.clock.now(),
                value,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        info!("cache cleared");
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many were removed.
    pub fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - self.entries.len();
        info!(prefix, removed, "cache invalidated");
        removed
    }

    /// Number of stored entries, including ones that have expired but not yet been read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock(ttl: u64) -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(ttl, Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn returns_value_before_ttl() {
        let (mut cache, clock) = cache_with_clock(300);
        cache.set("doc:comments", "v1".to_string());
        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get("doc:comments"), Some("v1".to_string()));
    }

    #[test]
    fn expires_exactly_at_ttl_and_purges() {
        let (mut cache, clock) = cache_with_clock(300);
        cache.set("doc:comments", "v1".to_string());
        clock.advance(Duration::from_secs(300));
        assert_eq!(cache.get("doc:comments"), None);
        assert!(cache.is_empty());

        // A fresh set after the purge starts a new lifetime.
        cache.set("doc:comments", "v2".to_string());
        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get("doc:comments"), Some("v2".to_string()));
    }

    #[test]
    fn missing_key_is_absent() {
        let (mut cache, _clock) = cache_with_clock(300);
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn set_overwrites_and_restamps() {
        let (mut cache, clock) = cache_with_clock(100);
        cache.set("k", "old".to_string());
        clock.advance(Duration::from_secs(90));
        cache.set("k", "new".to_string());
        clock.advance(Duration::from_secs(90));
        assert_eq!(cache.get("k"), Some("new".to_string()));
    }

    #[test]
    fn clear_removes_everything() {
        let (mut cache, _clock) = cache_with_clock(300);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn invalidate_prefix_is_scoped() {
        let (mut cache, _clock) = cache_with_clock(300);
        cache.set("doc1:comments", "a".to_string());
        cache.set("doc1:metadata", "b".to_string());
        cache.set("doc2:comments", "c".to_string());

        assert_eq!(cache.invalidate_prefix("doc1:"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("doc2:comments"), Some("c".to_string()));
    }
}
