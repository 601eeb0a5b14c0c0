//! Group statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one cache group
#[derive(Debug, Default)]
pub struct CacheStats {
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    local_loads: AtomicU64,
    loader_errors: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Calls to `get` with a non-empty key
    pub gets: u64,
    /// Served from the local store
    pub hits: u64,
    /// Not in the local store
    pub misses: u64,
    /// Successful loader calls
    pub local_loads: u64,
    /// Failed loader calls
    pub loader_errors: u64,
    /// Successful fetches from the owning peer
    pub peer_loads: u64,
    /// Failed fetches from the owning peer
    pub peer_errors: u64,
    /// Entries evicted from the local store
    pub evictions: u64,
    /// hits / (hits + misses)
    pub hit_ratio: f64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_loader_error(&self) {
        self.loader_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total successful loader calls
    pub fn local_loads(&self) -> u64 {
        self.local_loads.load(Ordering::Relaxed)
    }

    /// Get total successful peer fetches
    pub fn peer_loads(&self) -> u64 {
        self.peer_loads.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Copy all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits(),
            misses: self.misses(),
            local_loads: self.local_loads(),
            loader_errors: self.loader_errors.load(Ordering::Relaxed),
            peer_loads: self.peer_loads(),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            evictions: self.evictions(),
            hit_ratio: self.hit_ratio(),
        }
    }
}
