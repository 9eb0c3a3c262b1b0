//! Query metrics
//!
//! - Counters only, monotonic
//! - Shared across requests; never influences results
//! - Relaxed atomics; exact values, no ordering guarantees between counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for find requests
#[derive(Debug, Default)]
pub struct QueryMetrics {
    finds_completed: AtomicU64,
    finds_rejected: AtomicU64,
    finds_failed: AtomicU64,
    finds_cancelled: AtomicU64,
    root_queries: AtomicU64,
    count_queries: AtomicU64,
    deep_queries: AtomicU64,
    deep_paths_skipped: AtomicU64,
    rows_returned: AtomicU64,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_finds_completed(&self) {
        self.finds_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_finds_rejected(&self) {
        self.finds_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_finds_failed(&self) {
        self.finds_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_finds_cancelled(&self) {
        self.finds_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_root_queries(&self) {
        self.root_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_count_queries(&self) {
        self.count_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deep_queries(&self) {
        self.deep_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deep_paths_skipped(&self) {
        self.deep_paths_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_returned(&self, rows: u64) {
        self.rows_returned.fetch_add(rows, Ordering::Relaxed);
    }

    /// Queries handed to the executor, all kinds
    pub fn queries_issued(&self) -> u64 {
        self.root_queries.load(Ordering::Relaxed)
            + self.count_queries.load(Ordering::Relaxed)
            + self.deep_queries.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            finds_completed: self.finds_completed.load(Ordering::Relaxed),
            finds_rejected: self.finds_rejected.load(Ordering::Relaxed),
            finds_failed: self.finds_failed.load(Ordering::Relaxed),
            finds_cancelled: self.finds_cancelled.load(Ordering::Relaxed),
            root_queries: self.root_queries.load(Ordering::Relaxed),
            count_queries: self.count_queries.load(Ordering::Relaxed),
            deep_queries: self.deep_queries.load(Ordering::Relaxed),
            deep_paths_skipped: self.deep_paths_skipped.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub finds_completed: u64,
    pub finds_rejected: u64,
    pub finds_failed: u64,
    pub finds_cancelled: u64,
    pub root_queries: u64,
    pub count_queries: u64,
    pub deep_queries: u64,
    pub deep_paths_skipped: u64,
    pub rows_returned: u64,
}
