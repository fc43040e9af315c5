/// Time-to-live caches for the dashboard pipeline.
///
/// Entries are never invalidated, only aged out: a value computed at
/// `computed_at` is served until `ttl` has elapsed. Callers pass `now`
/// explicitly so refresh cycles (and tests) control the clock.
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A cached value and the instant it was computed.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub computed_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, computed_at: Instant) -> Self {
        Self { value, computed_at }
    }

    /// True once `ttl` or more has passed since the value was computed.
    pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.computed_at) >= ttl
    }
}

/// Keyed TTL cache. Stale entries are dropped on every insert.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// The cached value for `key`, if present and still fresh at `now`.
    pub fn get(&self, key: &K, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_stale(now, self.ttl))
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_stale(now, ttl));
        self.entries.insert(key, CacheEntry::new(value, now));
    }

    /// Return the fresh cached value or compute, store and return a new one.
    pub fn get_or_insert_with(&mut self, key: K, now: Instant, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key, now) {
            return value;
        }
        let value = compute();
        self.insert(key, value.clone(), now);
        value
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
