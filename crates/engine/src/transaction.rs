//! Transaction: the graph of actions/RVPs for one client call.
//!
//! A transaction owns its storage handle and its action/RVP allocations
//! until it terminates; the handle is committed or aborted exactly once,
//! and status transitions are monotonic (`Running` → `Committing` →
//! `Committed`, or `Running`/`Committing` → `Aborting` → `Aborted`).

use dora_core::{PartitionId, TableId, TxnId};
use dora_storage::TxnHandle;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Monotonic transaction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Actions are still being routed/executed.
    Running = 0,
    /// The final RVP fired successfully; commit has been requested.
    Committing = 1,
    /// The flusher confirmed durability.
    Committed = 2,
    /// A failure occurred somewhere in the graph; abort has been
    /// requested.
    Aborting = 3,
    /// The storage handle has been rolled back and all locks released.
    Aborted = 4,
}

/// Why a transaction ended in `Aborted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// An action's payload raised a logical constraint violation.
    ConstraintViolation(String),
    /// A lock request exceeded its configured wait timeout.
    Timeout,
    /// The lock manager detected (or was told of) a deadlock; this
    /// transaction was chosen as the victim. No cross-partition deadlock
    /// can actually arise from the graphs this coordinator builds (each
    /// transaction's actions form an acyclic wave DAG, so a wait on one
    /// partition never depends on this same transaction's progress on
    /// another), so this variant exists for taxonomy completeness and
    /// for a storage adapter that surfaces its own internal deadlocks.
    Deadlock,
    /// The coordinator's retry budget was exhausted.
    RetryLimitExceeded,
    /// The storage adapter reported a failure.
    StorageError(String),
    /// The transaction was cancelled by its caller before completion.
    Cancelled,
    /// The group-commit flusher failed to force the log.
    GroupCommitFailed,
}

impl AbortReason {
    /// Whether the coordinator should re-run the transaction from
    /// scratch rather than surface this reason to the client.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AbortReason::StorageError(_) | AbortReason::Deadlock | AbortReason::Timeout)
    }
}

/// One client transaction's graph-owning state.
pub struct Transaction {
    id: TxnId,
    handle: Arc<TxnHandle>,
    status: AtomicU8,
    abort_reason: Mutex<Option<AbortReason>>,
    participating_partitions: Mutex<SmallVec<[(TableId, PartitionId); 4]>>,
}

impl Transaction {
    /// Wrap a freshly-begun storage handle.
    pub fn new(id: TxnId, handle: Arc<TxnHandle>) -> Self {
        Transaction {
            id,
            handle,
            status: AtomicU8::new(TransactionStatus::Running as u8),
            abort_reason: Mutex::new(None),
            participating_partitions: Mutex::new(SmallVec::new()),
        }
    }

    /// This transaction's id.
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// This transaction's storage-manager handle. Shared across every
    /// action on every partition this transaction touches.
    pub fn storage_handle(&self) -> &Arc<TxnHandle> {
        &self.handle
    }

    /// Current status.
    pub fn status(&self) -> TransactionStatus {
        match self.status.load(Ordering::Acquire) {
            0 => TransactionStatus::Running,
            1 => TransactionStatus::Committing,
            2 => TransactionStatus::Committed,
            3 => TransactionStatus::Aborting,
            _ => TransactionStatus::Aborted,
        }
    }

    /// Record that this transaction has at least one action queued on
    /// `partition` of `table`, so its locks can be released there at
    /// termination.
    pub fn note_partition(&self, table: TableId, partition: PartitionId) {
        let mut parts = self.participating_partitions.lock();
        if !parts.contains(&(table, partition)) {
            parts.push((table, partition));
        }
    }

    /// Every (table, partition) pair this transaction has touched.
    pub fn participating_partitions(&self) -> SmallVec<[(TableId, PartitionId); 4]> {
        self.participating_partitions.lock().clone()
    }

    pub(crate) fn set_status(&self, status: TransactionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Mark this transaction for abort with `reason`, and set the sticky
    /// cancel flag on its storage handle so partition workers skip any
    /// of its actions still queued.
    pub fn mark_aborting(&self, reason: AbortReason) {
        *self.abort_reason.lock() = Some(reason);
        self.set_status(TransactionStatus::Aborting);
        self.handle.cancel();
    }

    /// The reason this transaction aborted, if it did.
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dora_storage::InMemoryStorage;
    use dora_storage::Storage;

    #[test]
    fn note_partition_is_idempotent() {
        let storage = InMemoryStorage::new();
        let handle = storage.begin().unwrap();
        let txn = Transaction::new(TxnId::from_raw(1), handle);
        let table = TableId::new(0);
        txn.note_partition(table, PartitionId::new(0));
        txn.note_partition(table, PartitionId::new(0));
        txn.note_partition(table, PartitionId::new(1));
        assert_eq!(txn.participating_partitions().len(), 2);
    }

    #[test]
    fn mark_aborting_sets_cancel_flag() {
        let storage = InMemoryStorage::new();
        let handle = storage.begin().unwrap();
        let txn = Transaction::new(TxnId::from_raw(1), handle);
        txn.mark_aborting(AbortReason::Cancelled);
        assert_eq!(txn.status(), TransactionStatus::Aborting);
        assert!(txn.storage_handle().is_cancelled());
    }
}
