//! Public types for the Dora unified API.
//!
//! Re-exports the vocabulary a caller needs to build and submit
//! transaction requests without reaching into `dora-core`/`dora-engine`
//! directly.

// Row/key vocabulary (dora-core)
pub use dora_core::{Key, KeyField, KeyRange, LockMode, PartitionId, TableId, TxnId, Value};

// Client-facing request/outcome surface (dora-api, dora-engine)
pub use dora_api::{AbortReason, TransactionOutcome, TransactionRequest};
pub use dora_engine::{DatabaseConfig, MetricsSnapshot, PendingOutcome};

// Durability trade-off (dora-durability)
pub use dora_durability::DurabilityMode;
