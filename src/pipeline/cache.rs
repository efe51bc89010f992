//! Bounded deduplication cache for image analyses.
//!
//! Maps an image [`Fingerprint`] to the terminal result of analysing it, so a
//! logo repeated on every page costs one vision call, not one per page.
//! Eviction is FIFO by insertion order: a lookup never promotes an entry.
//!
//! The cache is shared by every document a [`crate::Converter`] processes, so
//! all access goes through one internal mutex.

use crate::pipeline::analysis::SkipReason;
use crate::pipeline::fingerprint::Fingerprint;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Default number of remembered fingerprints.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// A cached terminal result. Failures are never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    Description(String),
    Skipped(SkipReason),
}

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<Fingerprint, CacheEntry>,
    /// Insertion order, oldest first.
    order: VecDeque<Fingerprint>,
    stats: CacheStats,
}

/// Fingerprint → result store with a fixed capacity.
#[derive(Debug)]
pub struct DeduplicationCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for DeduplicationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl DeduplicationCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                stats: CacheStats::default(),
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The map is always left consistent between statements, so a panic
        // elsewhere while holding the lock does not invalidate it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let mut inner = self.lock();
        match inner.entries.get(fingerprint).cloned() {
            Some(entry) => {
                inner.stats.hits += 1;
                Some(entry)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Insert `entry`, evicting the oldest-inserted entry when full.
    ///
    /// Re-storing a known fingerprint replaces its value in place and keeps
    /// its original position in the eviction order.
    pub fn store(&self, fingerprint: Fingerprint, entry: CacheEntry) {
        let mut inner = self.lock();
        if let Some(existing) = inner.entries.get_mut(&fingerprint) {
            *existing = entry;
            return;
        }

        if inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                inner.stats.evictions += 1;
                debug!(evicted = ?oldest, "Deduplication cache full; evicted oldest entry");
            }
        }

        inner.order.push_back(fingerprint);
        inner.entries.insert(fingerprint, entry);
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.lock().entries.contains_key(fingerprint)
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
        self.lock().stats
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}
