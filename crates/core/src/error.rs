//! Shared error taxonomy.
//!
//! This is the error type every `dora-*` crate below the public facade
//! converts into or wraps. It mirrors the taxonomy in the design: each
//! variant names a recovery policy as much as a cause.
//!
//! - [`CoreError::NotFound`] — recoverable, surfaced to the caller.
//! - [`CoreError::LockTimeout`] / [`CoreError::Deadlock`] — recovered by the
//!   coordinator retrying the transaction, bounded by `retry_limit`.
//! - [`CoreError::ConstraintViolation`] — surfaced to the client as an abort.
//! - [`CoreError::Storage`] — fatal for the transaction; the coordinator may
//!   retry once if the adapter reports the failure as transient.
//! - [`CoreError::Fatal`] — an invariant violation or allocation failure.
//!   Never retried; propagating this past the engine boundary is itself a
//!   bug report, not a recoverable condition.

use thiserror::Error;

/// Result alias used throughout the lower layers.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The shared error type for the storage/concurrency/durability/engine layers.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// No row exists for the given table/key.
    #[error("not found: {0}")]
    NotFound(String),

    /// A lock request exceeded its configured wait timeout.
    #[error("lock timeout waiting on {0}")]
    LockTimeout(String),

    /// The coordinator detected (or was told of) a deadlock; the victim
    /// transaction should be retried.
    #[error("deadlock involving transaction {0}")]
    Deadlock(crate::ids::TxnId),

    /// An action's payload violated a row-level constraint (e.g. a
    /// negative-balance check). Always aborts the transaction.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The storage adapter reported an I/O or durability failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The owning transaction was cancelled before this action ran.
    #[error("transaction cancelled")]
    Cancelled,

    /// An unrecoverable invariant violation (allocator failure, a
    /// `giveback` without a matching `borrow`, an RVP firing twice). The
    /// process should not attempt to continue past this.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CoreError {
    /// Whether the coordinator should retry the owning transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::LockTimeout(_) | CoreError::Deadlock(_))
    }

    /// Whether this error aborts the transaction but is not itself a bug.
    pub fn is_user_visible_abort(&self) -> bool {
        matches!(self, CoreError::ConstraintViolation(_) | CoreError::NotFound(_))
    }

    /// Whether this error means the transaction was cancelled rather than
    /// having failed on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }

    /// Whether this error should never be retried and indicates a defect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Fatal(_))
    }
}
