//! Shared types for the Dora transaction-processing kit.
//!
//! This crate has no dependency on any other `dora-*` crate. It defines the
//! vocabulary every other layer builds on:
//!
//! - [`ids`] — newtype identifiers for transactions, partitions and tables.
//! - [`key`] — composite ordered keys, key ranges, and lock modes.
//! - [`value`] — the row/field value representation.
//! - [`pool`] — the generic object pool (C1 in the design).
//! - [`error`] — the shared error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod key;
pub mod pool;
pub mod value;

pub use error::{CoreError, Result};
pub use ids::{PartitionId, TableId, TxnId};
pub use key::{Key, KeyField, KeyRange, LockMode};
pub use pool::ObjectPool;
pub use value::Value;
