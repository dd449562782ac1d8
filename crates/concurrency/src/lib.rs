//! Per-partition logical lock manager for the Dora engine (component C3).
//!
//! Logical keys, not storage pages, are the granularity: because all
//! actions on a partition execute on that partition's single worker
//! thread, no physical concurrency control is needed inside a partition.
//! This table only serializes the order in which contending actions may
//! proceed past the partition's entry.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock_manager;

pub use lock_manager::{GrantCallback, LockManager};
