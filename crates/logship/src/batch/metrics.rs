use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters shared between producers, flush tasks and the reporter.
/// Everything is relaxed atomics; exact cross-counter consistency is not
/// needed for reporting.
#[derive(Debug, Default)]
pub(crate) struct BatchMetrics {
    pub entries_processed: AtomicU64,
    pub batches_flushed: AtomicU64,
    pub flush_failures: AtomicU64,
    pub retries: AtomicU64,
    pub entries_flushed: AtomicU64,
    pub entries_dead_lettered: AtomicU64,
    pub last_flush_time: Mutex<Option<DateTime<Utc>>>,
}

impl BatchMetrics {
    pub fn record_flush(&self, entries: u64) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.entries_flushed.fetch_add(entries, Ordering::Relaxed);
        *self.last_flush_time.lock().expect("metrics lock poisoned") = Some(Utc::now());
    }

    pub fn record_transient_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, current_memory_usage: usize, collections_active: usize) -> BatchMetricsSnapshot {
        let batches_flushed = self.batches_flushed.load(Ordering::Relaxed);
        let entries_flushed = self.entries_flushed.load(Ordering::Relaxed);
        BatchMetricsSnapshot {
            total_entries_processed: self.entries_processed.load(Ordering::Relaxed),
            total_batches_flushed: batches_flushed,
            total_flush_failures: self.flush_failures.load(Ordering::Relaxed),
            total_retries: self.retries.load(Ordering::Relaxed),
            total_entries_dead_lettered: self.entries_dead_lettered.load(Ordering::Relaxed),
            average_batch_size: if batches_flushed == 0 {
                0.0
            } else {
                entries_flushed as f64 / batches_flushed as f64
            },
            last_flush_time: *self.last_flush_time.lock().expect("metrics lock poisoned"),
            current_memory_usage,
            collections_active,
        }
    }
}

/// Point-in-time view of the batch manager.
#[derive(Debug, Clone, Serialize)]
pub struct BatchMetricsSnapshot {
    pub total_entries_processed: u64,
    pub total_batches_flushed: u64,
    pub total_flush_failures: u64,
    pub total_retries: u64,
    pub total_entries_dead_lettered: u64,
    pub average_batch_size: f64,
    pub last_flush_time: Option<DateTime<Utc>>,
    /// Estimated bytes currently staged across all collections.
    pub current_memory_usage: usize,
    pub collections_active: usize,
}
