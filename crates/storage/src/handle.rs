//! Storage-manager transaction handle.

use dora_core::{Key, TableId, TxnId, Value};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// One step to reverse if the owning transaction aborts: the state of a
/// single row immediately before one write touched it under this handle.
/// Recorded by the adapter before applying each write so that `abort`
/// can restore exactly what `begin` found, regardless of how many writes
/// to how many keys happened in between.
#[derive(Debug, Clone)]
pub enum UndoEntry {
    /// The key did not exist before this write; undoing it deletes the
    /// row.
    Inserted {
        /// Table the write landed in.
        table: TableId,
        /// Row key.
        key: Key,
    },
    /// The key held `previous` before this write overwrote it; undoing
    /// it restores that value.
    Overwrote {
        /// Table the write landed in.
        table: TableId,
        /// Row key.
        key: Key,
        /// The row's value immediately before the write.
        previous: Value,
    },
    /// The key held `previous` before this write removed it; undoing it
    /// re-inserts that value.
    Removed {
        /// Table the write landed in.
        table: TableId,
        /// Row key.
        key: Key,
        /// The row's value immediately before the write.
        previous: Value,
    },
}

/// Lifecycle state of a storage handle's owning transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandleStatus {
    /// Accepting reads and writes.
    Open = 0,
    /// `commit()` has returned successfully.
    Committed = 1,
    /// `abort()` has returned, or the handle was cancelled before any
    /// commit.
    Aborted = 2,
}

/// A handle to one client transaction's storage-manager session.
///
/// Every [`crate::Storage::begin`] call returns one of these; every
/// `get`/`insert`/`update`/`delete`/`scan` call on the adapter takes a
/// `&TxnHandle` so the adapter can check the sticky-cancel flag before
/// doing any work, per the cancellation/timeout rule in the concurrency
/// model: a transaction aborted by the coordinator (client cancellation,
/// deadlock victim) sets this flag, and partition workers check it before
/// executing an action rather than letting the action run and then
/// discarding its result.
#[derive(Debug)]
pub struct TxnHandle {
    txn: TxnId,
    cancelled: AtomicBool,
    status: AtomicU8,
    undo_log: Mutex<Vec<UndoEntry>>,
}

impl TxnHandle {
    pub(crate) fn new(txn: TxnId) -> Self {
        TxnHandle {
            txn,
            cancelled: AtomicBool::new(false),
            status: AtomicU8::new(HandleStatus::Open as u8),
            undo_log: Mutex::new(Vec::new()),
        }
    }

    /// Record one write's undo step, in application order.
    pub fn record_undo(&self, entry: UndoEntry) {
        self.undo_log.lock().push(entry);
    }

    /// Drain every recorded undo step, in reverse-of-application order —
    /// the most recent write unwound first — so interleaved writes to
    /// the same key unwind back to front.
    pub fn drain_undo_log(&self) -> Vec<UndoEntry> {
        let mut entries = std::mem::take(&mut *self.undo_log.lock());
        entries.reverse();
        entries
    }

    /// The transaction this handle belongs to.
    pub fn txn_id(&self) -> TxnId {
        self.txn
    }

    /// Set the sticky-cancel flag. Idempotent; safe to call from any
    /// thread (the coordinator calls this, partition workers only read
    /// it).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether the transaction has been cancelled. Checked by a partition
    /// worker immediately before running an action's payload.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub fn status(&self) -> HandleStatus {
        match self.status.load(Ordering::Acquire) {
            0 => HandleStatus::Open,
            1 => HandleStatus::Committed,
            _ => HandleStatus::Aborted,
        }
    }

    pub(crate) fn mark_committed(&self) {
        self.status.store(HandleStatus::Committed as u8, Ordering::Release);
    }

    pub(crate) fn mark_aborted(&self) {
        self.status.store(HandleStatus::Aborted as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_across_reads() {
        let h = TxnHandle::new(TxnId::from_raw(1));
        assert!(!h.is_cancelled());
        h.cancel();
        assert!(h.is_cancelled());
    }

    #[test]
    fn starts_open() {
        let h = TxnHandle::new(TxnId::from_raw(1));
        assert_eq!(h.status(), HandleStatus::Open);
    }

    #[test]
    fn drain_undo_log_reverses_application_order() {
        let h = TxnHandle::new(TxnId::from_raw(1));
        let table = TableId::new(0);
        h.record_undo(UndoEntry::Inserted { table, key: Key::from_int(1) });
        h.record_undo(UndoEntry::Overwrote { table, key: Key::from_int(2), previous: Value::Int(5) });
        let drained = h.drain_undo_log();
        assert!(matches!(drained[0], UndoEntry::Overwrote { .. }));
        assert!(matches!(drained[1], UndoEntry::Inserted { .. }));
        assert!(h.drain_undo_log().is_empty());
    }
}
