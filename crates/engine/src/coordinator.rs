//! Transaction coordinator (component C8).
//!
//! A "graph template" here is a plain Rust closure over a [`GraphContext`]
//! rather than a registry of transaction-type tags looked up at runtime —
//! per the dispatch-over-dynamic-call design note, there is no virtual
//! call chain: the client-facing facade captures its concrete inputs into
//! the closure once, and the coordinator just runs it.
//!
//! `submit` is non-blocking in the sense the design calls for, but
//! without an async runtime in the dependency stack its non-blocking
//! contract is implemented with a short-lived driver thread per call,
//! parked immediately on the transaction's completion condvar — the same
//! blockable-handle pattern the flusher and the RVP already use
//! elsewhere in this crate. Actual work still happens only on partition
//! worker threads; this thread exists solely to drive retries and relay
//! the final outcome.

use crate::action::{Action, ActionPayload, LockDecl};
use crate::arena::TransactionArena;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::partition::{Partition, TransactionRegistry};
use crate::router::Router;
use crate::rvp::{Rvp, RvpContinuation, RvpHandle};
use crate::transaction::{AbortReason, Transaction, TransactionStatus};
use dora_core::ids::TxnIdAllocator;
use dora_core::pool::ObjectPool;
use dora_core::{CoreError, Key, PartitionId, Result, TableId};
use dora_durability::GroupCommitFlusher;
use dora_storage::Storage;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// The outcome a client sees for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Every effect is durable.
    Committed,
    /// No effect is visible.
    Aborted(AbortReason),
}

/// A graph template: given concrete inputs (already captured by the
/// closure) and a context to allocate/submit actions through, build and
/// dispatch one transaction's action/RVP graph.
pub type GraphFn = dyn Fn(&GraphContext) -> Result<()> + Send + Sync;

type OutcomeSlot = Arc<(Mutex<Option<TransactionOutcome>>, Condvar)>;

/// Handed to a graph template so it can allocate actions, route and
/// enqueue them, and build the RVPs that sequence its waves. Cheap to
/// clone — every field is an `Arc` — so a midway RVP's continuation can
/// hold its own copy to build the next wave when it fires.
#[derive(Clone)]
pub struct GraphContext {
    txn: Arc<Transaction>,
    coordinator: Arc<Coordinator>,
    finished: OutcomeSlot,
}

impl GraphContext {
    /// The transaction this graph belongs to.
    pub fn txn(&self) -> &Arc<Transaction> {
        &self.txn
    }

    /// Allocate an action bound to whichever partition owns `key` in
    /// `table`, attach it to `successor`, and enqueue it there.
    pub fn submit(
        &self,
        table: TableId,
        key: Key,
        locks: SmallVec<[LockDecl; 2]>,
        payload: ActionPayload,
        successor: RvpHandle,
    ) -> Result<()> {
        let partition_id = self.coordinator.router.route(table, &key)?;
        self.txn.note_partition(table, partition_id);
        let action = self
            .coordinator
            .arena
            .alloc(self.txn.id(), partition_id, locks, payload)
            .with_successor(successor);
        let partition = self.coordinator.partition(table, partition_id)?;
        partition.enqueue(action);
        Ok(())
    }

    /// Build a midway RVP: on firing, runs `on_fire` with the aggregate
    /// success flag so it can submit the next wave (or route to an
    /// abort/cleanup wave on failure).
    pub fn midway_rvp(&self, predecessor_count: u32, on_fire: impl FnOnce(bool) + Send + 'static) -> RvpHandle {
        Rvp::new(predecessor_count, RvpContinuation::Midway(Box::new(on_fire)))
    }

    /// Build this transaction's terminal RVP: on firing, commits or
    /// aborts the transaction via the coordinator and wakes whatever is
    /// blocked on its outcome.
    pub fn terminal_rvp(&self, predecessor_count: u32) -> RvpHandle {
        let txn = self.txn.clone();
        let coordinator = self.coordinator.clone();
        let finished = self.finished.clone();
        Rvp::new(
            predecessor_count,
            RvpContinuation::Final(Box::new(move |success| {
                coordinator.finalize(txn, success, finished);
            })),
        )
    }
}

/// Builds and drives transaction graphs across the partitions of a
/// running database. Owns nothing a partition doesn't already own more
/// specifically — it's a dispatcher, not a data structure.
pub struct Coordinator {
    router: Arc<Router>,
    partitions: FxHashMap<(TableId, PartitionId), Arc<Partition>>,
    storage: Arc<dyn Storage>,
    flusher: Arc<GroupCommitFlusher>,
    arena: TransactionArena,
    txn_ids: TxnIdAllocator,
    registry: TransactionRegistry,
    retry_limit: u32,
    metrics: Metrics,
}

impl Coordinator {
    /// Wire up a coordinator over an already-running set of partitions.
    /// `registry` must be the same instance every one of `partitions` was
    /// spawned with — the coordinator registers a transaction there on
    /// `begin`, and partition workers look it up from the action they
    /// dequeue. A coordinator built over a different registry than its
    /// partitions would leave every action unable to find its
    /// transaction's storage handle.
    pub fn new(
        router: Arc<Router>,
        partitions: FxHashMap<(TableId, PartitionId), Arc<Partition>>,
        storage: Arc<dyn Storage>,
        flusher: Arc<GroupCommitFlusher>,
        action_pool: Arc<ObjectPool<Action>>,
        registry: TransactionRegistry,
        retry_limit: u32,
    ) -> Arc<Coordinator> {
        Arc::new(Coordinator {
            router,
            partitions,
            storage,
            flusher,
            arena: TransactionArena::new(action_pool),
            txn_ids: TxnIdAllocator::default(),
            registry,
            retry_limit,
            metrics: Metrics::new(),
        })
    }

    /// A snapshot of this coordinator's transaction counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn partition(&self, table: TableId, id: PartitionId) -> Result<&Arc<Partition>> {
        self.partitions
            .get(&(table, id))
            .ok_or_else(|| CoreError::Fatal(format!("no partition {id} registered for {table}")))
    }

    /// Non-blocking entry point: builds and submits the graph, returning
    /// a handle whose `wait()` blocks for the final outcome.
    pub fn submit(self: &Arc<Self>, graph: Arc<GraphFn>) -> PendingOutcome {
        let state: OutcomeSlot = Arc::new((Mutex::new(None), Condvar::new()));
        let coordinator = self.clone();
        let result_state = state.clone();
        std::thread::spawn(move || {
            let outcome = coordinator.run_with_retries(graph);
            let (lock, cvar) = &*result_state;
            *lock.lock() = Some(outcome);
            cvar.notify_one();
        });
        PendingOutcome { state }
    }

    /// Blocking wrapper: submit and wait for the outcome.
    pub fn run(self: &Arc<Self>, graph: Arc<GraphFn>) -> TransactionOutcome {
        self.submit(graph).wait()
    }

    fn run_with_retries(self: &Arc<Self>, graph: Arc<GraphFn>) -> TransactionOutcome {
        let mut attempt = 0u32;
        loop {
            match self.run_once(graph.clone()) {
                TransactionOutcome::Aborted(reason) if reason.is_retryable() && attempt < self.retry_limit => {
                    attempt += 1;
                    self.metrics.record_retried();
                    tracing::debug!(attempt, ?reason, "retrying transaction after transient failure");
                }
                TransactionOutcome::Aborted(reason) if reason.is_retryable() => {
                    tracing::warn!(?reason, retry_limit = self.retry_limit, "retry budget exhausted");
                    return TransactionOutcome::Aborted(AbortReason::RetryLimitExceeded);
                }
                other => return other,
            }
        }
    }

    fn run_once(self: &Arc<Self>, graph: Arc<GraphFn>) -> TransactionOutcome {
        let txn_id = self.txn_ids.alloc();
        let handle = match self.storage.begin() {
            Ok(h) => h,
            Err(e) => return TransactionOutcome::Aborted(core_error_to_abort_reason(&e)),
        };
        let txn = Arc::new(Transaction::new(txn_id, handle));
        self.registry.insert(txn_id, txn.clone());
        self.metrics.record_started();

        let finished: OutcomeSlot = Arc::new((Mutex::new(None), Condvar::new()));
        let ctx = GraphContext {
            txn: txn.clone(),
            coordinator: self.clone(),
            finished: finished.clone(),
        };

        if let Err(e) = graph(&ctx) {
            // The graph never reached a partition worker (a routing
            // error building it), so no RVP will ever fire to finalize
            // this transaction — clean up here instead.
            self.registry.remove(&txn_id);
            let _ = self.storage.abort(txn.storage_handle());
            self.metrics.record_finished(false);
            return TransactionOutcome::Aborted(core_error_to_abort_reason(&e));
        }

        let (lock, cvar) = &*finished;
        let mut guard = lock.lock();
        while guard.is_none() {
            cvar.wait(&mut guard);
        }
        guard.take().unwrap()
    }

    fn finalize(&self, txn: Arc<Transaction>, success: bool, finished: OutcomeSlot) {
        let outcome = if success {
            txn.set_status(TransactionStatus::Committing);
            match self.storage.commit(txn.storage_handle()) {
                Ok(()) => match self.flusher.commit(txn.id()) {
                    Ok(()) => {
                        txn.set_status(TransactionStatus::Committed);
                        TransactionOutcome::Committed
                    }
                    Err(_) => {
                        txn.mark_aborting(AbortReason::GroupCommitFailed);
                        txn.set_status(TransactionStatus::Aborted);
                        TransactionOutcome::Aborted(AbortReason::GroupCommitFailed)
                    }
                },
                Err(e) => {
                    let reason = core_error_to_abort_reason(&e);
                    txn.mark_aborting(reason.clone());
                    txn.set_status(TransactionStatus::Aborted);
                    TransactionOutcome::Aborted(reason)
                }
            }
        } else {
            let reason = txn
                .abort_reason()
                .unwrap_or_else(|| AbortReason::StorageError("action failed with no recorded reason".into()));
            let _ = self.storage.abort(txn.storage_handle());
            txn.set_status(TransactionStatus::Aborted);
            TransactionOutcome::Aborted(reason)
        };

        for (table, partition_id) in txn.participating_partitions() {
            if let Ok(partition) = self.partition(table, partition_id) {
                partition.lock_manager().release_all(txn.id());
            }
        }
        self.registry.remove(&txn.id());
        self.metrics.record_finished(matches!(outcome, TransactionOutcome::Committed));

        let (lock, cvar) = &*finished;
        *lock.lock() = Some(outcome);
        cvar.notify_one();
    }
}

fn core_error_to_abort_reason(err: &CoreError) -> AbortReason {
    match err {
        CoreError::ConstraintViolation(msg) => AbortReason::ConstraintViolation(msg.clone()),
        CoreError::LockTimeout(_) => AbortReason::Timeout,
        CoreError::Deadlock(_) => AbortReason::Deadlock,
        CoreError::Cancelled => AbortReason::Cancelled,
        CoreError::NotFound(msg) | CoreError::Storage(msg) | CoreError::Fatal(msg) => AbortReason::StorageError(msg.clone()),
    }
}

/// A handle to a transaction in flight. `wait()` blocks until the
/// coordinator's final RVP has fired and the transaction has been
/// committed or aborted.
pub struct PendingOutcome {
    state: OutcomeSlot,
}

impl PendingOutcome {
    /// Block until the outcome is known.
    pub fn wait(&self) -> TransactionOutcome {
        let (lock, cvar) = &*self.state;
        let mut guard = lock.lock();
        while guard.is_none() {
            cvar.wait(&mut guard);
        }
        guard.take().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::new_action_pool;
    use dora_core::{KeyRange, LockMode, Value};
    use dora_storage::InMemoryStorage;
    use std::time::Duration;

    const ACCOUNTS: TableId = TableId::new(0);

    fn build_coordinator(partition_count: u32) -> Arc<Coordinator> {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let pool = new_action_pool(8);
        let mut router_builder = crate::router::RouterBuilder::new();
        router_builder = router_builder.numeric_table(ACCOUNTS, partition_count, 25);
        let router = Arc::new(router_builder.build());

        let coordinator_registry = TransactionRegistry::default();
        let mut partitions = FxHashMap::default();
        for i in 0..partition_count {
            let low = (i as i64) * 25;
            let high = low + 24;
            let partition = Partition::spawn(
                PartitionId::new(i),
                ACCOUNTS,
                KeyRange::new(Key::from_int(low), Key::from_int(high)),
                storage.clone(),
                pool.clone(),
                coordinator_registry.clone(),
            );
            partitions.insert((ACCOUNTS, PartitionId::new(i)), partition);
        }

        // Seed starting balances.
        let seed_handle = storage.begin().unwrap();
        for id in 0..(partition_count as i64 * 25) {
            storage.insert(&seed_handle, ACCOUNTS, Key::from_int(id), Value::Int(100)).unwrap();
        }
        storage.commit(&seed_handle).unwrap();

        let flusher = Arc::new(GroupCommitFlusher::start(storage.clone(), true, 8, Duration::from_millis(5)));
        Coordinator::new(router, partitions, storage, flusher, pool, coordinator_registry, 3)
    }

    fn account_balance(coordinator: &Coordinator, id: i64) -> i64 {
        // Route and read directly through storage for assertions; tests
        // don't have a client-facing get().
        coordinator.storage.get(&coordinator.storage.begin().unwrap(), ACCOUNTS, &Key::from_int(id)).unwrap().as_int().unwrap()
    }

    #[test]
    fn single_partition_update_commits() {
        let coordinator = build_coordinator(4);
        let graph: Arc<GraphFn> = Arc::new(|ctx: &GraphContext| {
            let key = Key::from_int(42);
            let rvp = ctx.terminal_rvp(1);
            ctx.submit(
                ACCOUNTS,
                key.clone(),
                SmallVec::from_vec(vec![(key.clone(), LockMode::Exclusive)]),
                ActionPayload::Update {
                    table: ACCOUNTS,
                    key,
                    mutate: Box::new(|v| Ok(Value::Int(v.as_int().unwrap() + 10))),
                },
                rvp,
            )
        });
        let outcome = coordinator.run(graph);
        assert_eq!(outcome, TransactionOutcome::Committed);
        assert_eq!(account_balance(&coordinator, 42), 110);
    }

    #[test]
    fn two_partition_transfer_preserves_sum() {
        let coordinator = build_coordinator(4);
        let from = 10i64;
        let to = 60i64;
        let amount = 5i64;
        // Single-wave fan-out-to-final: both updates are independent and
        // submitted up front against one terminal RVP armed for both.
        let graph: Arc<GraphFn> = Arc::new(move |ctx: &GraphContext| {
            let rvp = ctx.terminal_rvp(2);
            let from_key = Key::from_int(from);
            ctx.submit(
                ACCOUNTS,
                from_key.clone(),
                SmallVec::from_vec(vec![(from_key.clone(), LockMode::Exclusive)]),
                ActionPayload::Update {
                    table: ACCOUNTS,
                    key: from_key,
                    mutate: Box::new(move |v| {
                        let balance = v.as_int().unwrap();
                        if balance < amount {
                            return Err(CoreError::ConstraintViolation("insufficient balance".into()));
                        }
                        Ok(Value::Int(balance - amount))
                    }),
                },
                rvp.clone(),
            )?;
            let to_key = Key::from_int(to);
            ctx.submit(
                ACCOUNTS,
                to_key.clone(),
                SmallVec::from_vec(vec![(to_key.clone(), LockMode::Exclusive)]),
                ActionPayload::Update {
                    table: ACCOUNTS,
                    key: to_key,
                    mutate: Box::new(move |v| Ok(Value::Int(v.as_int().unwrap() + amount))),
                },
                rvp,
            )
        });
        let outcome = coordinator.run(graph);
        assert_eq!(outcome, TransactionOutcome::Committed);
        assert_eq!(account_balance(&coordinator, from), 95);
        assert_eq!(account_balance(&coordinator, to), 105);
    }

    #[test]
    fn constraint_violation_aborts_and_leaves_balance_unchanged() {
        let coordinator = build_coordinator(4);
        let graph: Arc<GraphFn> = Arc::new(|ctx: &GraphContext| {
            let key = Key::from_int(42);
            let rvp = ctx.terminal_rvp(1);
            ctx.submit(
                ACCOUNTS,
                key.clone(),
                SmallVec::from_vec(vec![(key.clone(), LockMode::Exclusive)]),
                ActionPayload::Update {
                    table: ACCOUNTS,
                    key,
                    mutate: Box::new(|v| {
                        let balance = v.as_int().unwrap();
                        if balance - 1000 < 0 {
                            return Err(CoreError::ConstraintViolation("negative balance".into()));
                        }
                        Ok(Value::Int(balance - 1000))
                    }),
                },
                rvp,
            )
        });
        let outcome = coordinator.run(graph);
        assert_eq!(outcome, TransactionOutcome::Aborted(AbortReason::ConstraintViolation("negative balance".into())));
        assert_eq!(account_balance(&coordinator, 42), 100);
    }
}
