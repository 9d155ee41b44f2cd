//! Counters describing what a worker pool has done.

use std::sync::atomic::{AtomicU64, Ordering};

use kinfolio_scorer::IncrementOutcome;
use serde::Serialize;

/// Totals accumulated by a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    /// Tasks that changed a read count.
    pub applied: u64,
    /// Tasks whose policy assigned no increment.
    pub unchanged: u64,
    /// Tasks suppressed by a live dedup marker.
    pub deduplicated: u64,
    /// Tasks whose entity no longer existed.
    pub missing: u64,
    /// Attempts that failed transiently and were scheduled again.
    pub retried: u64,
    /// Tasks abandoned after a terminal error or exhausted retries.
    pub failed: u64,
}

impl WorkerReport {
    /// Number of tasks that reached a final state.
    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.applied
            .saturating_add(self.unchanged)
            .saturating_add(self.deduplicated)
            .saturating_add(self.missing)
            .saturating_add(self.failed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Stats {
    applied: AtomicU64,
    unchanged: AtomicU64,
    deduplicated: AtomicU64,
    missing: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

impl Stats {
    pub(crate) fn record(&self, outcome: &IncrementOutcome) {
        let counter = match outcome {
            IncrementOutcome::Applied { .. } => &self.applied,
            IncrementOutcome::Unchanged { .. } => &self.unchanged,
            IncrementOutcome::Deduplicated => &self.deduplicated,
            IncrementOutcome::Missing => &self.missing,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> WorkerReport {
        WorkerReport {
            applied: self.applied.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
