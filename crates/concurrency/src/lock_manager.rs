//! Per-partition logical lock manager (component C3).
//!
//! This is the central design inversion from the teacher's OCC-based
//! `TransactionManager`: because every action on a partition runs on that
//! partition's one worker thread, there is no physical concurrency to
//! control inside a partition. What remains is purely logical — ordering
//! actions that want the same key — so a lock table here guards admission
//! order, not memory visibility. The `commit_lock`-guarded
//! validate-then-apply sequence the teacher used to prevent TOCTOU races
//! has no counterpart here; a partition never has two actions touching
//! storage at once to race in the first place.

use dora_core::{Key, LockMode, TxnId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Callback invoked when a lock request is granted. Invoked synchronously
/// on the caller's thread for an immediately-grantable request, or inline
/// on the releasing thread's stack for a request that had to wait.
pub type GrantCallback = Box<dyn FnOnce() + Send>;

struct QueueEntry {
    txn: TxnId,
    mode: LockMode,
    granted: bool,
    callback: Option<GrantCallback>,
}

#[derive(Default)]
struct Inner {
    queues: FxHashMap<Key, VecDeque<QueueEntry>>,
    held_by_txn: FxHashMap<TxnId, SmallVec<[Key; 4]>>,
}

/// One partition's logical lock table.
///
/// All state lives behind a single `parking_lot::Mutex`; critical
/// sections are bounded by the number of entries queued on the one key
/// being touched, which in steady state (no contention) is O(1).
pub struct LockManager {
    inner: Mutex<Inner>,
}

impl LockManager {
    /// Create an empty lock table.
    pub fn new() -> Self {
        LockManager {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Request `mode` on `key` for `txn`. If immediately compatible with
    /// the current holder set and no earlier waiter blocks it, `grant_cb`
    /// is invoked before this call returns and `true` is returned;
    /// otherwise the request is queued and `grant_cb` will be invoked
    /// later, inline on some other thread's call to [`Self::release`],
    /// and this call returns `false`.
    pub fn acquire(&self, txn: TxnId, key: &Key, mode: LockMode, grant_cb: GrantCallback) -> bool {
        let mut inner = self.inner.lock();
        let queue = inner.queues.entry(key.clone()).or_default();
        queue.push_back(QueueEntry {
            txn,
            mode,
            granted: false,
            callback: Some(grant_cb),
        });
        let newly_granted = Self::grant_eligible_prefix(queue);
        for granted_txn in &newly_granted {
            inner.held_by_txn.entry(*granted_txn).or_default().push(key.clone());
        }
        newly_granted.contains(&txn)
    }

    /// Release `txn`'s hold on `key`, then grant every contiguous waiter
    /// that becomes eligible, invoking each one's callback inline on this
    /// thread before returning.
    pub fn release(&self, txn: TxnId, key: &Key) {
        let mut inner = self.inner.lock();
        Self::release_locked(&mut inner, txn, key);
    }

    /// Release every key `txn` currently holds or is waiting on. Called
    /// once at transaction end.
    pub fn release_all(&self, txn: TxnId) {
        let mut inner = self.inner.lock();
        let keys: SmallVec<[Key; 4]> = inner.held_by_txn.remove(&txn).unwrap_or_default();
        for key in keys {
            Self::release_locked(&mut inner, txn, &key);
        }
    }

    fn release_locked(inner: &mut Inner, txn: TxnId, key: &Key) {
        if let Some(held) = inner.held_by_txn.get_mut(&txn) {
            held.retain(|k| k != key);
        }
        let Some(queue) = inner.queues.get_mut(key) else {
            return;
        };
        queue.retain(|e| e.txn != txn);
        let newly_granted = Self::grant_eligible_prefix(queue);
        for granted_txn in newly_granted {
            inner.held_by_txn.entry(granted_txn).or_default().push(key.clone());
        }
        if inner.queues.get(key).map(|q| q.is_empty()).unwrap_or(false) {
            inner.queues.remove(key);
        }
    }

    /// Scan the queue from the front, tracking the set of currently
    /// granted modes, and grant every ungranted entry compatible with all
    /// of them — stopping at the first incompatible entry so that a
    /// blocked waiter is never jumped by one behind it. This single rule
    /// gives FIFO writer-preference for free: once an Exclusive request
    /// is enqueued, it becomes the first ungranted entry the scan hits,
    /// and nothing after it can be granted until it is.
    ///
    /// Returns the txns newly granted by this call, in grant order.
    fn grant_eligible_prefix(queue: &mut VecDeque<QueueEntry>) -> SmallVec<[TxnId; 4]> {
        let mut newly_granted = SmallVec::new();
        let mut holder_modes: SmallVec<[LockMode; 4]> = SmallVec::new();
        for entry in queue.iter_mut() {
            if entry.granted {
                holder_modes.push(entry.mode);
                continue;
            }
            let compatible = holder_modes.iter().all(|h| h.compatible_with(entry.mode));
            if !compatible {
                break;
            }
            entry.granted = true;
            holder_modes.push(entry.mode);
            newly_granted.push(entry.txn);
            if let Some(cb) = entry.callback.take() {
                cb();
            }
        }
        newly_granted
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
