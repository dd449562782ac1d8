//! Transaction counters, aggregated lazily on read.
//!
//! Grounded on the shape of the teacher's `DatabaseMetrics` (committed /
//! aborted / active / commit rate), but collected here as a flat set of
//! `AtomicU64` counters rather than true per-thread-local counters — the
//! corpus doesn't show a thread-local stats pattern to imitate, and at
//! one increment per transaction termination (not per action), a shared
//! atomic counter set never becomes a bottleneck worth trading away for
//! thread-local aggregation complexity. "Aggregated lazily" is still
//! honored in spirit: [`Coordinator`](crate::coordinator::Coordinator)
//! never computes `commit_rate` until [`Metrics::snapshot`] is called.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Process-wide transaction counters.
#[derive(Default)]
pub struct Metrics {
    committed: AtomicU64,
    aborted: AtomicU64,
    retried: AtomicU64,
    active: AtomicI64,
}

impl Metrics {
    /// Construct a zeroed counter set.
    pub fn new() -> Self {
        Metrics::default()
    }

    /// Record a transaction attempt starting.
    pub fn record_started(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transaction retry (a failed attempt that will be re-run).
    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transaction's terminal outcome.
    pub fn record_finished(&self, committed: bool) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        if committed {
            self.committed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.aborted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Compute a point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let committed = self.committed.load(Ordering::Relaxed);
        let aborted = self.aborted.load(Ordering::Relaxed);
        let total = committed + aborted;
        MetricsSnapshot {
            committed,
            aborted,
            retried: self.retried.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed).max(0) as u64,
            commit_rate: if total == 0 { 0.0 } else { committed as f64 / total as f64 },
        }
    }
}

/// A computed snapshot of [`Metrics`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    /// Total transactions committed since startup.
    pub committed: u64,
    /// Total transactions aborted since startup (after exhausting
    /// retries, if any).
    pub aborted: u64,
    /// Total individual retry attempts across all transactions.
    pub retried: u64,
    /// Transactions currently running.
    pub active: u64,
    /// `committed / (committed + aborted)`, or `0.0` if none have
    /// finished yet.
    pub commit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_rate_is_zero_with_no_completions() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().commit_rate, 0.0);
    }

    #[test]
    fn tracks_committed_and_aborted_counts() {
        let metrics = Metrics::new();
        metrics.record_started();
        metrics.record_started();
        metrics.record_finished(true);
        metrics.record_finished(false);
        let snap = metrics.snapshot();
        assert_eq!(snap.committed, 1);
        assert_eq!(snap.aborted, 1);
        assert_eq!(snap.active, 0);
        assert_eq!(snap.commit_rate, 0.5);
    }

    #[test]
    fn active_reflects_in_flight_transactions() {
        let metrics = Metrics::new();
        metrics.record_started();
        metrics.record_started();
        metrics.record_finished(true);
        assert_eq!(metrics.snapshot().active, 1);
    }
}
