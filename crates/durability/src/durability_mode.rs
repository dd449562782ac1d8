//! Durability mode for WAL writes.
//!
//! Adapted from the teacher's `DurabilityMode`, unchanged in shape: the
//! same three-way choice between no persistence, per-commit fsync, and a
//! bounded-staleness batched mode. What changes is who decides the
//! trade-off — here it's driven by the flusher's `flusher_batch_ms` /
//! `flusher_batch_bytes` configuration (§6) rather than being set
//! per-write.

/// Durability guarantee for WAL writes, and the performance/safety
/// trade-off that implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// No persistence. The flusher still runs (it still unblocks waiting
    /// clients) but never calls `force_log`. All data is lost on crash.
    /// Used for tests and the classic executor's in-memory benchmarks.
    None,
    /// fsync after every commit. Maximum durability, highest latency.
    Strict,
    /// fsync every `batch_size` commits or every `interval_ms`,
    /// whichever comes first. The default: a commit may be un-flushed for
    /// up to `interval_ms` or `batch_size` other commits before a crash
    /// could lose it.
    Batched {
        /// Maximum time between forces, in milliseconds.
        interval_ms: u64,
        /// Maximum commits accumulated between forces.
        batch_size: usize,
    },
}

impl DurabilityMode {
    /// Whether this mode ever calls `force_log`.
    pub fn requires_force(&self) -> bool {
        !matches!(self, DurabilityMode::None)
    }

    /// Whether every single commit must be forced before it is
    /// acknowledged (as opposed to being batched with others).
    pub fn requires_immediate_force(&self) -> bool {
        matches!(self, DurabilityMode::Strict)
    }
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::Batched {
            interval_ms: 100,
            batch_size: 1000,
        }
    }
}
