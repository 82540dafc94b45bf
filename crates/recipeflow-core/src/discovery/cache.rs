//! Bounded TTL + LRU cache shared by concurrent flows.

use indexmap::{Equivalent, IndexMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Hit, miss and eviction counters of one cache.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub size: usize,
}

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

struct Inner<K, V> {
    // Insertion order doubles as recency order: the front is least recently touched.
    entries: IndexMap<K, CacheEntry<V>>,
    hits: usize,
    misses: usize,
    evictions: usize,
}

/// Cache whose entries expire after `ttl` and whose size never exceeds
/// `capacity`.
///
/// Expired entries are evicted lazily on read. Inserting into a full cache evicts
/// the least recently touched entry. Writes are last-writer-wins.
pub struct TtlLruCache<K, V> {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Hash + Eq + fmt::Debug,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            inner: Mutex::new(Inner {
                entries: IndexMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.get_at(key, Instant::now())
    }

    /// Read `key` as of `now`, touching it on a hit.
    pub fn get_at<Q>(&self, key: &Q, now: Instant) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let mut inner = self.lock();
        let Some(index) = inner.entries.get_index_of(key) else {
            inner.misses += 1;
            return None;
        };

        let expired = inner
            .entries
            .get_index(index)
            .is_some_and(|(_, entry)| now.saturating_duration_since(entry.stored_at) >= self.ttl);
        if expired {
            inner.entries.shift_remove_index(index);
            inner.misses += 1;
            #[cfg(feature = "tracing")]
            tracing::trace!("cache entry expired");
            return None;
        }

        let (key, entry) = inner.entries.shift_remove_index(index)?;
        let value = entry.value.clone();
        inner.entries.insert(key, entry);
        inner.hits += 1;
        Some(value)
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&self, key: K, value: V, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.lock();
        inner.entries.shift_remove(&key);
        while inner.entries.len() >= self.capacity {
            let Some((_evicted, _)) = inner.entries.shift_remove_index(0) else {
                break;
            };
            inner.evictions += 1;
            #[cfg(feature = "tracing")]
            tracing::trace!(key = ?_evicted, "cache entry evicted");
        }
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
            },
        );
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.lock().entries.shift_remove(key).map(|entry| entry.value)
    }

    /// Drop every entry whose key matches `predicate`. Returns how many were dropped.
    pub fn remove_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !predicate(key));
        before - inner.entries.len()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.entries.len(),
        }
    }
}
