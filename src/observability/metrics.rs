//! Operational counters
//!
//! Counters only; they increase monotonically and reset on process start.
//! Relaxed ordering is enough since no decision is taken on their values.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    renders: AtomicU64,
    render_failures: AtomicU64,
    /// Requests served by another request's in-flight render
    renders_deduplicated: AtomicU64,
    snapshots_written: AtomicU64,
}

/// Point-in-time copy of every counter, as served at `/metrics`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub renders: u64,
    pub render_failures: u64,
    pub renders_deduplicated: u64,
    pub snapshots_written: u64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_renders(&self) {
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_render_failures(&self) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_renders_deduplicated(&self) {
        self.renders_deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_snapshots_written(&self) {
        self.snapshots_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            renders: self.renders.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            renders_deduplicated: self.renders_deduplicated.load(Ordering::Relaxed),
            snapshots_written: self.snapshots_written.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // MetricsSnapshot holds only integers; serialization cannot fail
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}
