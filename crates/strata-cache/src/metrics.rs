//! Cache metrics collection.
//!
//! Lock-free counters recorded by the storing layers, with a serializable
//! snapshot for reporting.
//!
//! ## Example
//!
//! ```rust
//! use strata_cache::metrics::LayerMetrics;
//!
//! let metrics = LayerMetrics::new();
//! metrics.record_hit(1024);
//! metrics.record_miss();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.hits, 1);
//! println!("{}", metrics.export_json());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Thread-safe per-layer metrics collector.
#[derive(Debug, Default)]
pub struct LayerMetrics {
    /// Number of query hits
    hits: AtomicU64,
    /// Number of query misses
    misses: AtomicU64,
    /// Number of stores accepted
    stores: AtomicU64,
    /// Number of entries evicted
    evictions: AtomicU64,
    /// Total bytes served on hits
    bytes_hit: AtomicU64,
    /// Total bytes written by stores
    bytes_stored: AtomicU64,
    /// Total bytes evicted
    bytes_evicted: AtomicU64,
}

impl LayerMetrics {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query hit.
    pub fn record_hit(&self, bytes: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.bytes_hit.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a query miss.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted store.
    pub fn record_store(&self, bytes: u64) {
        self.stores.fetch_add(1, Ordering::Relaxed);
        self.bytes_stored.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record an eviction.
    pub fn record_eviction(&self, bytes: u64) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.bytes_evicted.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get the cache hit rate (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Get the current snapshot of metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            bytes_hit: self.bytes_hit.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
            bytes_evicted: self.bytes_evicted.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
        }
    }

    /// Export the snapshot as a JSON object.
    #[must_use]
    pub fn export_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Point-in-time view of a layer's counters.
#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    /// Number of query hits.
    pub hits: u64,
    /// Number of query misses.
    pub misses: u64,
    /// Number of stores accepted.
    pub stores: u64,
    /// Number of entries evicted.
    pub evictions: u64,
    /// Total bytes served on hits.
    pub bytes_hit: u64,
    /// Total bytes written by stores.
    pub bytes_stored: u64,
    /// Total bytes evicted.
    pub bytes_evicted: u64,
    /// Hit rate (0.0 to 1.0).
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = LayerMetrics::new();
        metrics.record_hit(100);
        metrics.record_hit(50);
        metrics.record_miss();
        metrics.record_store(200);
        metrics.record_eviction(75);

        let snap = metrics.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.stores, 1);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.bytes_hit, 150);
        assert_eq!(snap.bytes_stored, 200);
        assert_eq!(snap.bytes_evicted, 75);
    }

    #[test]
    fn test_hit_rate() {
        let metrics = LayerMetrics::new();
        assert_eq!(metrics.hit_rate(), 0.0);

        metrics.record_hit(1);
        metrics.record_hit(1);
        metrics.record_miss();
        metrics.record_miss();

        assert!((metrics.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_export_json() {
        let metrics = LayerMetrics::new();
        metrics.record_hit(42);

        let json = metrics.export_json();
        assert!(json.contains("\"hits\":1"));
        assert!(json.contains("\"bytes_hit\":42"));
    }
}
