//! Unified error type for Dora.
//!
//! A transaction's outcome is already a plain value
//! ([`TransactionOutcome::Committed`]/[`TransactionOutcome::Aborted`]),
//! not a `Result` — there is nothing "exceptional" about an abort in
//! this architecture, it is the documented alternative outcome of
//! `run()`. [`Error`] exists for the one place that distinction is
//! awkward to carry around: callers who just want `?` to work.

use thiserror::Error;

pub use dora_core::CoreError;
pub use dora_engine::AbortReason;
pub use dora_engine::TransactionOutcome;

/// All Dora errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The transaction ran to completion but was aborted.
    #[error("transaction aborted: {0:?}")]
    Aborted(AbortReason),

    /// A lower-level engine or storage-adapter failure surfaced outside
    /// of a transaction's own outcome (e.g. during setup).
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for Dora operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Convert a transaction outcome into a `Result<()>`, for callers
    /// who'd rather `?` past an abort than match on it.
    pub fn from_outcome(outcome: TransactionOutcome) -> Result<()> {
        match outcome {
            TransactionOutcome::Committed => Ok(()),
            TransactionOutcome::Aborted(reason) => Err(Error::Aborted(reason)),
        }
    }
}
