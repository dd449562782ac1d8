//! Per-transaction arena over the action object pool (component C1 applied
//! to the engine's hot allocation path).
//!
//! The coordinator allocates one of these per transaction to build that
//! transaction's action graph. It's a thin borrow/giveback wrapper, not
//! a bump allocator: `Action`s are fixed-size values handed out by value
//! from [`dora_core::pool::ObjectPool`], so "arena" here means "this
//! transaction's working set of pooled actions", not a memory region.
//!
//! RVPs are *not* pooled — they're always `Arc`-shared across every
//! predecessor action that posts to them, and the pool's borrow/giveback
//! contract assumes a single owner returning the object when done. An
//! `Arc<Rvp>` only becomes safe to recycle once every action holding a
//! clone has posted and dropped its reference, which the pool has no way
//! to observe. Actions vastly outnumber RVPs per transaction graph (one
//! per wave, a handful at most), so skipping the pool for RVPs gives up
//! little.

use crate::action::{Action, ActionPayload, LockDecl};
use dora_core::pool::ObjectPool;
use dora_core::{PartitionId, TxnId};
use smallvec::SmallVec;
use std::sync::Arc;

/// Allocates and recycles this transaction's [`Action`]s against a
/// shared, pre-warmed pool.
pub struct TransactionArena {
    pool: Arc<ObjectPool<Action>>,
}

impl TransactionArena {
    /// Wrap a shared action pool.
    pub fn new(pool: Arc<ObjectPool<Action>>) -> Self {
        TransactionArena { pool }
    }

    /// Borrow an action from the pool and initialize it.
    pub fn alloc(&self, txn: TxnId, partition: PartitionId, locks: SmallVec<[LockDecl; 2]>, payload: ActionPayload) -> Action {
        let mut action = self.pool.borrow();
        action.set_payload(txn, partition, locks, payload);
        action
    }

    /// Return a completed action to the pool, clearing its state first.
    pub fn release(&self, mut action: Action) {
        action.reset();
        self.pool.giveback(action);
    }
}

/// Build the shared action pool, pre-warmed with `init_count` inert
/// placeholder actions.
pub fn new_action_pool(init_count: usize) -> Arc<ObjectPool<Action>> {
    Arc::new(ObjectPool::with_capacity(init_count, Action::pooled_default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dora_core::TableId;

    #[test]
    fn alloc_then_release_reuses_pool_slot() {
        let pool = new_action_pool(1);
        let arena = TransactionArena::new(pool.clone());
        assert_eq!(pool.idle_count(), 1);
        let action = arena.alloc(
            TxnId::from_raw(1),
            PartitionId::new(0),
            SmallVec::new(),
            ActionPayload::Delete { table: TableId::new(0), key: dora_core::Key::from_int(1) },
        );
        assert_eq!(pool.idle_count(), 0);
        arena.release(action);
        assert_eq!(pool.idle_count(), 1);
    }
}
