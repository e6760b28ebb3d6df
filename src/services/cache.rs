use dashmap::{mapref::entry::Entry, DashMap};
use std::time::{Duration, Instant};

/// A thread-safe cache with TTL support.
pub struct Cache<V> {
    data: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V: Clone> Cache<V> {
    /// Create a new cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            default_ttl,
        }
    }

    /// Get a live value from the cache. Expired entries are dropped on read.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.data.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.data.remove(key);
            None
        }
    }

    /// Set a value with the default TTL.
    pub fn set(&self, key: String, value: V) {
        self.data.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.default_ttl,
            },
        );
    }

    /// Insert or modify the value under `key` while holding its shard lock,
    /// refreshing the TTL. `update` sees the current value only if it is live.
    pub fn upsert<F>(&self, key: String, update: F) -> V
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let now = Instant::now();
        let expires_at = now + self.default_ttl;
        match self.data.entry(key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let live = (entry.expires_at > now).then_some(&entry.value);
                let value = update(live);
                entry.value = value.clone();
                entry.expires_at = expires_at;
                value
            }
            Entry::Vacant(vacant) => {
                let value = update(None);
                vacant.insert(CacheEntry {
                    value: value.clone(),
                    expires_at,
                });
                value
            }
        }
    }

    /// Remove all expired entries from the cache.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.data.retain(|_, entry| entry.expires_at > now);
    }

    /// Get the number of entries in the cache (including expired).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
