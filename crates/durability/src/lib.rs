//! Write-ahead log and group-commit flusher for the Dora engine.
//!
//! - [`wal`] — the on-disk log format and entry types.
//! - [`durability_mode`] — the durability/performance trade-off knob.
//! - [`flusher`] — the dedicated thread that batches commits into forces.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod durability_mode;
pub mod flusher;
pub mod wal;

pub use durability_mode::DurabilityMode;
pub use flusher::GroupCommitFlusher;
pub use wal::{replay, Wal, WalEntry};
