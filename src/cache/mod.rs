//! In-memory match result cache.
//!
//! The hot tier of the two-tier cache:
//!
//! ```text
//! [Request] -> [In-Memory TTL+LRU] -> [SQLite store] -> [Compute]
//! ```
//!
//! Entries are keyed by rendered match-context key and bounded both by a
//! TTL and a maximum entry count with least-recently-used eviction. The
//! persistent tier lives in [`crate::store`]; this one exists to absorb
//! repeated identical requests within a session.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::CacheSettings;
use crate::model::MatchSet;

/// Counters describing cache behavior since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently resident
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

struct Entry {
    value: MatchSet,
    inserted_at: Instant,
    /// Logical access clock value; smallest = least recently used
    last_access: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    clock: u64,
    hits: u64,
    misses: u64,
    inserts: u64,
    evictions: u64,
}

/// Bounded TTL + LRU cache for match sets.
///
/// Interior mutability behind a single mutex; all operations are short and
/// non-blocking, so contention stays negligible at this crate's scale.
pub struct MatchCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_entries: usize,
}

impl MatchCache {
    /// Create a cache with the given settings.
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
                hits: 0,
                misses: 0,
                inserts: 0,
                evictions: 0,
            }),
            ttl: settings.ttl(),
            max_entries: settings.max_entries.max(1),
        }
    }

    /// Look up a match set by its context key.
    ///
    /// An expired entry is removed on access and reported as a miss.
    pub fn get(&self, key: &str) -> Option<MatchSet> {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                entry.last_access = clock;
                let value = entry.value.clone();
                inner.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
            tracing::debug!(key, "cache entry expired");
        }
        inner.misses += 1;
        None
    }

    /// Insert (or replace) a match set.
    ///
    /// When the cache is full and the key is new, the least recently used
    /// entry is evicted first.
    pub fn insert(&self, key: impl Into<String>, value: MatchSet) {
        let key = key.into();
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                inner.entries.remove(&victim);
                inner.evictions += 1;
                tracing::debug!(key = %victim, "cache entry evicted");
            }
        }

        inner.inserts += 1;
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                last_access: clock,
            },
        );
    }

    /// Remove a single entry.
    pub fn invalidate(&self, key: &str) {
        self.inner.lock().entries.remove(key);
    }

    /// Drop every entry. Counters survive.
    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        if dropped > 0 {
            tracing::info!(dropped, "match cache cleared");
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            inserts: inner.inserts,
            evictions: inner.evictions,
        }
    }
}
