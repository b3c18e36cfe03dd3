//! Concurrent TTL map with a size bound.
//!
//! `ExpiringMap` owns its `DashMap`; callers only ever see cloned values, so
//! every write is a whole-entry create-or-replace and no lock is held across
//! calls.
//!
//! ## Size bound
//!
//! When an insert would grow the map past `max_entries`, expired entries are
//! purged first. If the map is still full, the entry with the oldest
//! `created_at` is evicted. The bound is approximate under concurrent inserts
//! (each insert checks independently), which is enough to stop unbounded
//! growth from a flood of unique keys.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use super::entry::CacheEntry;

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries currently stored, live or not.
    pub total: usize,
    /// Entries still within their TTL.
    pub active: usize,
    /// Entries past their TTL that the sweeper has not removed yet.
    pub expired: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing live.
    pub misses: u64,
    /// Live entries dropped to honour the size bound.
    pub evictions: u64,
    /// Configured size bound.
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Thread-safe map of [`CacheEntry`] values with TTL expiry.
pub struct ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty map.
    ///
    /// # Arguments
    ///
    /// * `ttl` - Lifetime of an entry from its creation
    /// * `max_entries` - Size bound; see the module docs for the eviction order
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Returns a clone of the live value for `key`.
    ///
    /// An expired entry found on lookup is removed and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired_at(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value().value().clone());
            }
        }

        // Re-check under the shard write lock: a concurrent insert may have
        // replaced the expired entry in between.
        self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Returns `true` if a live entry exists for `key`, without touching the
    /// hit/miss counters.
    pub fn contains_live(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    /// Stores `value` for the full TTL, replacing any previous entry.
    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        self.store(key, value, now, now + self.ttl);
    }

    /// Stores `value` until the earlier of the TTL and `deadline`.
    ///
    /// Returns `false` without storing anything when `deadline` has already
    /// passed.
    pub fn insert_with_deadline(&self, key: K, value: V, deadline: Instant) -> bool {
        let now = Instant::now();
        if deadline <= now {
            return false;
        }
        self.store(key, value, now, deadline.min(now + self.ttl));
        true
    }

    fn store(&self, key: K, value: V, created_at: Instant, expires_at: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room(created_at);
        }

        self.entries
            .insert(key, CacheEntry::new(value, created_at, expires_at));
    }

    fn make_room(&self, now: Instant) {
        if self.purge_expired_at(now) > 0 && self.entries.len() < self.max_entries {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.created_at())
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    max_entries = self.max_entries,
                    "Cache at capacity, evicted oldest entry"
                );
            }
        }
    }

    /// Removes the entry for `key`. Returns `true` if one was present.
    pub fn remove(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry whose key and value match `predicate`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&K, &V) -> bool,
    {
        let mut removed = 0;
        self.entries.retain(|key, entry| {
            if predicate(key, entry.value()) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Removes every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired_at(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scans the entries without modifying them.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let (total, expired) = self
            .entries
            .iter()
            .fold((0usize, 0usize), |(total, expired), entry| {
                (total + 1, expired + usize::from(entry.is_expired_at(now)))
            });

        CacheStats {
            total,
            active: total - expired,
            expired,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            max_entries: self.max_entries,
        }
    }
}
