//! Size-bounded LRU store of response bodies.
//!
//! `CacheStore` is single-threaded; [`ObjectCache`](super::ObjectCache) wraps
//! it in a mutex for sharing between connection tasks.

use bytes::Bytes;

use super::{CacheEntry, CacheStats, LruList};

/// Result of offering a body to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The body is now the most recently used entry.
    Stored {
        /// Number of entries evicted to make room.
        evicted: usize,
    },
    /// The body exceeds the per-object limit and was not stored.
    TooLarge,
}

/// LRU store bounded by total body bytes.
///
/// Invariants after every public method returns:
/// - `total_size` equals the sum of resident body lengths,
/// - `total_size <= max_cache_size`,
/// - every resident body is at most `max_object_size` bytes.
#[derive(Debug)]
pub struct CacheStore {
    entries: LruList<CacheEntry>,
    total_size: usize,
    max_cache_size: usize,
    max_object_size: usize,
    stats: CacheStats,
}

impl CacheStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `max_cache_size` - Budget for the sum of all resident body sizes
    /// * `max_object_size` - Largest single body that will be admitted
    pub fn new(max_cache_size: usize, max_object_size: usize) -> Self {
        Self {
            entries: LruList::new(),
            total_size: 0,
            max_cache_size,
            max_object_size,
            stats: CacheStats::new(),
        }
    }

    /// Returns the entry for `key` and promotes it to most recently used.
    pub fn lookup(&mut self, key: &str) -> Option<CacheEntry> {
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Stores `body` under `key` as the most recently used entry.
    ///
    /// An existing entry for `key` is replaced. Least recently used entries
    /// are evicted until the new body fits the budget.
    pub fn insert(&mut self, key: impl Into<String>, body: Bytes) -> Admission {
        let size = body.len();
        if size > self.max_object_size || size > self.max_cache_size {
            self.stats.rejected += 1;
            return Admission::TooLarge;
        }

        let key = key.into();
        if let Some(old) = self.entries.remove(&key) {
            self.total_size -= old.size();
        }

        let mut evicted = 0;
        while self.total_size + size > self.max_cache_size {
            let Some((_, victim)) = self.entries.pop_back() else {
                break;
            };
            self.total_size -= victim.size();
            evicted += 1;
        }

        self.entries.push_front(key.clone(), CacheEntry::new(key, body));
        self.total_size += size;
        self.stats.insertions += 1;
        self.stats.evictions += evicted as u64;

        Admission::Stored { evicted }
    }

    /// Returns `true` if `key` is resident, without promoting it.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Resident keys with their sizes, most recently used first.
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.to_owned(), entry.size()))
            .collect()
    }

    /// Returns current counters together with occupancy.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_size: self.total_size,
            ..self.stats.clone()
        }
    }
}
