//! Convenient imports for Dora.
//!
//! ```ignore
//! use dora::prelude::*;
//!
//! let db = Dora::ephemeral();
//! db.run_result(TransactionRequest::UpdateBalance {
//!     table: TableId::new(0),
//!     key: Key::from_int(1),
//!     delta: 10,
//! })?;
//! ```

// Main entry point
pub use crate::database::{Dora, DoraBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Request/outcome surface
pub use crate::types::{
    AbortReason, DatabaseConfig, DurabilityMode, Key, KeyField, KeyRange, LockMode,
    MetricsSnapshot, PartitionId, PendingOutcome, TableId, TransactionOutcome,
    TransactionRequest, TxnId, Value,
};
