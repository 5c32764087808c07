//! Bounded, optionally expiring memoization cache.
//!
//! ```text
//! BoundedCache
//!     ├── entries: HashMap<K, Entry<V>>     value, insertion seq, insertion instant
//!     └── order:   VecDeque<(seq, K)>       insertion order, may hold ghost keys
//! ```
//!
//! Overwriting or invalidating a key leaves its old `(seq, key)` pair in the
//! queue. Eviction skips pairs whose sequence no longer matches the live entry,
//! and the queue is compacted once ghosts outnumber live entries.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::clock::{Clock, SystemClock};

/// Share of the capacity evicted when a new key arrives at a full cache.
const EVICTION_DIVISOR: usize = 10;

/// Counters exposed by [`BoundedCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

struct Entry<V> {
    value: V,
    seq: u64,
    inserted_at: DateTime<Utc>,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: VecDeque<(u64, K)>,
    next_seq: u64,
}

/// Fixed-capacity cache evicting in insertion order.
///
/// # Thread Safety
///
/// All state sits behind one `parking_lot::Mutex`. The lock is never held
/// while a value is being computed (see [`BoundedCache::get_or_compute`]), so
/// two callers missing the same key may both compute it; the later insert wins.
pub struct BoundedCache<K, V> {
    name: &'static str,
    capacity: usize,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<K, V>>,
    counters: Counters,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self::with_clock(name, capacity, None, Arc::new(SystemClock))
    }

    /// Create a cache whose entries expire `ttl` after insertion, as seen by `clock`.
    pub fn with_clock(
        name: &'static str,
        capacity: usize,
        ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            ttl,
            clock,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &Entry<V>, now: DateTime<Utc>) -> bool {
        self.ttl.is_some_and(|ttl| now - entry.inserted_at >= ttl)
    }

    /// Look up a live entry. Expired entries are dropped and count as misses.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => self.is_expired(entry, now),
        };

        if expired {
            inner.entries.remove(key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or overwrite `key`.
    ///
    /// A new key arriving at a full cache first evicts the oldest tenth of the
    /// capacity (at least one entry). Overwriting refreshes the key's position
    /// and timestamp.
    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let evicted = Self::evict_oldest(&mut inner, (self.capacity / EVICTION_DIVISOR).max(1));
            self.counters.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            log::debug!("cache {}: evicted {} entries", self.name, evicted);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((seq, key.clone()));
        inner.entries.insert(
            key,
            Entry {
                value,
                seq,
                inserted_at: now,
            },
        );
        self.counters.insertions.fetch_add(1, Ordering::Relaxed);

        if inner.order.len() > 2 * inner.entries.len() + 16 {
            Self::compact(&mut inner);
        }
    }

    /// Return the cached value or compute, insert and return it.
    ///
    /// `compute` runs without the lock held. Errors are returned as-is and
    /// nothing is cached.
    pub fn get_or_compute<E, F>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Remove every entry matching `predicate`.
    ///
    /// # Returns
    /// The number of entries removed.
    pub fn invalidate_where<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&K, &V) -> bool,
    {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, entry| !predicate(key, &entry.value));
        let removed = before - inner.entries.len();
        self.counters.invalidations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.order.clear();
        self.counters.invalidations.fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            len: self.len(),
            capacity: self.capacity,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            insertions: self.counters.insertions.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }

    fn evict_oldest(inner: &mut Inner<K, V>, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            let Some((seq, key)) = inner.order.pop_front() else {
                break;
            };
            // Skip ghosts left behind by overwrites and invalidations
            if inner.entries.get(&key).is_some_and(|entry| entry.seq == seq) {
                inner.entries.remove(&key);
                evicted += 1;
            }
        }
        evicted
    }

    fn compact(inner: &mut Inner<K, V>) {
        let Inner { entries, order, .. } = inner;
        order.retain(|(seq, key)| entries.get(key).is_some_and(|entry| entry.seq == *seq));
    }
}
