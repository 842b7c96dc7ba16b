//! Cache counters.

/// A point-in-time view of cache activity and occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Bodies admitted.
    pub insertions: u64,
    /// Entries removed to make room.
    pub evictions: u64,
    /// Bodies refused for exceeding the per-object limit.
    pub rejected: u64,
    /// Entries currently resident.
    pub entries: usize,
    /// Bytes currently resident.
    pub total_size: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns hits / (hits + misses), or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
