//! In-memory object cache shared by all connection tasks.
//!
//! Response bodies are kept in a byte-bounded store ordered by recency of
//! use. Every operation goes through [`ObjectCache`], which serializes
//! callers behind one mutex; the lock is never held across I/O, only for the
//! in-memory map and list updates.

mod entry;
mod lru;
mod stats;
mod store;


use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

pub use entry::{CacheEntry, SERVER_NAME};
pub use lru::LruList;
pub use stats::CacheStats;
pub use store::{Admission, CacheStore};

/// Default budget for the sum of all cached body sizes, in bytes.
pub const MAX_CACHE_SIZE: usize = 1_049_000;

/// Default size limit for a single cacheable body, in bytes.
pub const MAX_OBJECT_SIZE: usize = 102_400;

/// Thread-safe handle to the process-wide object cache.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use cacheproxy::cache::ObjectCache;
///
/// let cache = ObjectCache::default();
/// cache.insert("example.com:80/index.html", Bytes::from_static(b"<html></html>"));
///
/// let hit = cache.lookup("example.com:80/index.html").unwrap();
/// assert_eq!(&hit.body[..], b"<html></html>");
/// assert!(cache.lookup("example.com:80/other.html").is_none());
/// ```
#[derive(Debug)]
pub struct ObjectCache {
    store: Mutex<CacheStore>,
    max_object_size: usize,
}

impl ObjectCache {
    pub fn new(max_cache_size: usize, max_object_size: usize) -> Self {
        Self {
            store: Mutex::new(CacheStore::new(max_cache_size, max_object_size)),
            max_object_size,
        }
    }

    /// Looks `key` up and, on a hit, promotes it to most recently used in the
    /// same critical section.
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.lock().lookup(key)
    }

    /// Offers a fully received body to the cache.
    pub fn insert(&self, key: impl Into<String>, body: Bytes) -> Admission {
        self.lock().insert(key, body)
    }

    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    /// Returns `true` if `key` is resident, without promoting it.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    /// Resident keys with their sizes, most recently used first.
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        self.lock().snapshot()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    // Store mutations never panic midway, so a poisoned lock still guards a
    // consistent store.
    fn lock(&self) -> MutexGuard<'_, CacheStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new(MAX_CACHE_SIZE, MAX_OBJECT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn object_limit_is_inclusive() {
        let cache = ObjectCache::default();
        assert_eq!(cache.max_object_size(), MAX_OBJECT_SIZE);
        let edge = Bytes::from(vec![1u8; MAX_OBJECT_SIZE]);
        assert_eq!(cache.insert("edge", edge), Admission::Stored { evicted: 0 });
        let over = Bytes::from(vec![1u8; MAX_OBJECT_SIZE + 1]);
        assert_eq!(cache.insert("over", over), Admission::TooLarge);
    }

    #[test]
    fn oversized_insert_is_never_resident() {
        let cache = ObjectCache::default();
        let big = Bytes::from(vec![0u8; 200_000]);
        assert_eq!(cache.insert("big", big), Admission::TooLarge);
        assert!(!cache.contains("big"));
        assert!(cache.lookup("big").is_none());
    }

    #[test]
    fn repeated_lookups_return_same_body() {
        let cache = ObjectCache::default();
        cache.insert("k", Bytes::from_static(b"payload"));
        for _ in 0..5 {
            assert_eq!(&cache.lookup("k").unwrap().body[..], b"payload");
        }
        assert_eq!(cache.stats().hits, 5);
    }

    #[test]
    fn concurrent_inserts_stay_within_budget() {
        let cache = Arc::new(ObjectCache::new(MAX_CACHE_SIZE, MAX_OBJECT_SIZE));
        let handles: Vec<_> = (0..16)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..20 {
                        let len = 10_000 + (worker * 997 + i * 131) % 90_000;
                        let fill = (worker as u8).wrapping_add(i as u8);
                        cache.insert(format!("w{worker}-{i}"), Bytes::from(vec![fill; len]));
                        cache.lookup(&format!("w{worker}-{}", i / 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = cache.snapshot();
        let stats = cache.stats();
        let sum: usize = snapshot.iter().map(|(_, size)| size).sum();
        assert!(stats.total_size <= MAX_CACHE_SIZE);
        assert_eq!(stats.total_size, sum);
        assert_eq!(stats.entries, snapshot.len());

        for (key, size) in snapshot {
            let entry = cache.lookup(&key).unwrap();
            assert_eq!(entry.body.len(), size);
            assert_eq!(entry.key, key);
            let first = entry.body[0];
            assert!(entry.body.iter().all(|&b| b == first));
        }
    }
}
