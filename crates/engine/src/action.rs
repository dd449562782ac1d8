//! Action: one-partition unit of transactional work (component C5).
//!
//! Payloads are a tagged union rather than a trait object, per the
//! dispatch-over-dynamic-call redesign: the four common row operations
//! (`Get`/`Insert`/`Update`/`Delete`) match straight through to a direct
//! storage call with no indirection, and only `Custom` — used for
//! transaction-specific logic that doesn't reduce to a single row op,
//! e.g. a balance check that reads then conditionally writes — pays for
//! a boxed closure. `run` selects its path once, from the tag.

use crate::rvp::RvpHandle;
use dora_core::{CoreError, Key, PartitionId, Result, TableId, TxnId, Value};
use dora_storage::{Storage, TxnHandle};
use smallvec::SmallVec;

pub use dora_core::LockMode;

/// One entry in an action's pre-declared lock set.
pub type LockDecl = (Key, LockMode);

/// The operation an action performs once its locks are granted.
pub enum ActionPayload {
    /// Point read.
    Get {
        /// Table to read from.
        table: TableId,
        /// Key to read.
        key: Key,
    },
    /// Insert a new row.
    Insert {
        /// Table to insert into.
        table: TableId,
        /// Row key.
        key: Key,
        /// Row value.
        value: Value,
    },
    /// Read-modify-write: reads the current row, passes it through
    /// `mutate`, writes the result back. `mutate` returning `Err` aborts
    /// the action with that error (the common shape for a balance check
    /// that must reject a negative result).
    Update {
        /// Table to update.
        table: TableId,
        /// Row key.
        key: Key,
        /// Transform applied to the current value.
        mutate: Box<dyn FnOnce(Value) -> Result<Value> + Send>,
    },
    /// Delete a row.
    Delete {
        /// Table to delete from.
        table: TableId,
        /// Row key.
        key: Key,
    },
    /// Escape hatch for logic that doesn't reduce to one row operation.
    Custom(Box<dyn FnOnce(&dyn Storage, &TxnHandle) -> Result<Value> + Send>),
}

/// Lifecycle state of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Allocated, not yet enqueued or enqueued but not yet locked.
    Pending,
    /// All declared locks granted.
    Locked,
    /// Payload running against storage.
    Executing,
    /// Payload completed without error.
    Succeeded,
    /// Payload errored, or the transaction was cancelled before running.
    Failed,
}

/// A hook run by the partition worker immediately after the payload
/// completes, before the outcome is posted to the successor RVP. Used to
/// copy a read result into shared RVP state for a later wave to consume
/// (e.g. TM1's `GetNewDest` result feeding `UpdSubData`).
pub type CompletionHook = Box<dyn FnOnce(&ActionOutcome) + Send>;

/// The result of running an action's payload.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// The payload ran to completion. Carries the read value for `Get`,
    /// the post-mutation value for `Update`, or the custom closure's
    /// return value; `Insert`/`Delete` carry `Value::Null`.
    Succeeded(Value),
    /// The payload errored, or the action was skipped because its
    /// transaction was cancelled. Keeps the original error variant so
    /// the coordinator can classify retryable vs. terminal failures
    /// instead of pattern-matching on a rendered message.
    Failed(CoreError),
}

/// One-partition work item, bound to a transaction, with a pre-declared
/// lock set and an operation payload. Constructed by the coordinator,
/// enqueued on exactly one partition, and returned to the action object
/// pool once its outcome has been posted.
pub struct Action {
    txn: TxnId,
    partition: PartitionId,
    locks: SmallVec<[LockDecl; 2]>,
    payload: Option<ActionPayload>,
    successor: Option<RvpHandle>,
    retry_count: u32,
    state: ActionState,
    on_complete: Option<CompletionHook>,
}

impl Action {
    /// Construct an action. `successor` is `None` only for an action
    /// whose completion is observed by nothing but its own side effects —
    /// in practice always `Some` once wired by the coordinator.
    pub fn new(txn: TxnId, partition: PartitionId, locks: SmallVec<[LockDecl; 2]>, payload: ActionPayload) -> Self {
        Action {
            txn,
            partition,
            locks,
            payload: Some(payload),
            successor: None,
            retry_count: 0,
            state: ActionState::Pending,
            on_complete: None,
        }
    }

    /// Construct an inert placeholder action, used only to pre-warm the
    /// action object pool. [`Self::set_payload`] fills it in before it is
    /// ever enqueued.
    pub fn pooled_default() -> Self {
        Action {
            txn: TxnId::from_raw(0),
            partition: PartitionId::new(0),
            locks: SmallVec::new(),
            payload: None,
            successor: None,
            retry_count: 0,
            state: ActionState::Pending,
            on_complete: None,
        }
    }

    /// Attach the RVP this action posts its outcome to.
    pub fn with_successor(mut self, successor: RvpHandle) -> Self {
        self.successor = Some(successor);
        self
    }

    /// Attach a completion hook, run before the outcome is posted.
    pub fn with_on_complete(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// The transaction this action belongs to.
    pub fn txn_id(&self) -> TxnId {
        self.txn
    }

    /// The partition this action must run on.
    pub fn partition_id(&self) -> PartitionId {
        self.partition
    }

    /// This action's pre-declared lock set.
    pub fn locks(&self) -> &[LockDecl] {
        &self.locks
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActionState {
        self.state
    }

    /// Number of times this action has been retried by the coordinator.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn mark_locked(&mut self) {
        self.state = ActionState::Locked;
    }

    /// Run the payload against `storage` using `handle`. Consumes the
    /// payload — an action is run at most once per lock grant.
    pub fn run(&mut self, storage: &dyn Storage, handle: &TxnHandle) -> ActionOutcome {
        self.state = ActionState::Executing;
        let payload = match self.payload.take() {
            Some(p) => p,
            None => return ActionOutcome::Failed(CoreError::Fatal("action run twice".into())),
        };
        let result = match payload {
            ActionPayload::Get { table, key } => storage.get(handle, table, &key),
            ActionPayload::Insert { table, key, value } => {
                storage.insert(handle, table, key, value).map(|_| Value::Null)
            }
            ActionPayload::Update { table, key, mutate } => storage
                .get(handle, table, &key)
                .and_then(mutate)
                .and_then(|new_value| storage.update(handle, table, &key, new_value.clone()).map(|_| new_value)),
            ActionPayload::Delete { table, key } => storage.delete(handle, table, &key).map(|_| Value::Null),
            ActionPayload::Custom(f) => f(storage, handle),
        };
        match result {
            Ok(value) => {
                self.state = ActionState::Succeeded;
                ActionOutcome::Succeeded(value)
            }
            Err(e) => {
                self.state = ActionState::Failed;
                ActionOutcome::Failed(e)
            }
        }
    }

    /// Mark this action Failed without running its payload — used when
    /// the owning transaction was cancelled before this action reached
    /// the front of its partition's queue.
    pub fn skip_cancelled(&mut self) -> ActionOutcome {
        self.payload = None;
        self.state = ActionState::Failed;
        ActionOutcome::Failed(CoreError::Cancelled)
    }

    /// Invoke the completion hook (if any) and post the outcome to the
    /// successor RVP.
    pub fn post(&mut self, outcome: ActionOutcome) {
        if let Some(hook) = self.on_complete.take() {
            hook(&outcome);
        }
        if let Some(successor) = &self.successor {
            let success = matches!(outcome, ActionOutcome::Succeeded(_));
            successor.post(success);
        }
    }

    /// Reset this action for return to its object pool. Clears the
    /// payload, hooks, and successor so the next borrower starts clean.
    pub fn reset(&mut self) {
        self.payload = None;
        self.successor = None;
        self.on_complete = None;
        self.locks.clear();
        self.retry_count = 0;
        self.state = ActionState::Pending;
    }

    pub(crate) fn set_payload(&mut self, txn: TxnId, partition: PartitionId, locks: SmallVec<[LockDecl; 2]>, payload: ActionPayload) {
        self.txn = txn;
        self.partition = partition;
        self.locks = locks;
        self.payload = Some(payload);
    }

    pub(crate) fn increment_retry(&mut self) {
        self.retry_count += 1;
    }
}

/// Convenience: pull the `CoreError` out of a failed outcome, if any.
pub fn outcome_to_error(outcome: &ActionOutcome) -> Option<CoreError> {
    match outcome {
        ActionOutcome::Succeeded(_) => None,
        ActionOutcome::Failed(e) => Some(e.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dora_storage::InMemoryStorage;

    #[test]
    fn get_action_runs_against_storage() {
        let storage = InMemoryStorage::new();
        let handle = storage.begin().unwrap();
        let table = TableId::new(0);
        let key = Key::from_int(1);
        storage.insert(&handle, table, key.clone(), Value::Int(5)).unwrap();

        let mut action = Action::new(
            TxnId::from_raw(1),
            PartitionId::new(0),
            SmallVec::new(),
            ActionPayload::Get { table, key },
        );
        match action.run(&storage, &handle) {
            ActionOutcome::Succeeded(Value::Int(v)) => assert_eq!(v, 5),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(action.state(), ActionState::Succeeded);
    }

    #[test]
    fn update_mutate_can_reject_with_error() {
        let storage = InMemoryStorage::new();
        let handle = storage.begin().unwrap();
        let table = TableId::new(0);
        let key = Key::from_int(1);
        storage.insert(&handle, table, key.clone(), Value::Int(5)).unwrap();

        let mut action = Action::new(
            TxnId::from_raw(1),
            PartitionId::new(0),
            SmallVec::new(),
            ActionPayload::Update {
                table,
                key,
                mutate: Box::new(|v| match v.as_int() {
                    Some(n) if n >= 10 => Ok(Value::Int(n - 10)),
                    _ => Err(CoreError::ConstraintViolation("insufficient balance".into())),
                }),
            },
        );
        match action.run(&storage, &handle) {
            ActionOutcome::Failed(CoreError::ConstraintViolation(msg)) => assert!(msg.contains("insufficient")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(action.state(), ActionState::Failed);
    }

    #[test]
    fn reset_clears_state_for_pool_reuse() {
        let mut action = Action::new(
            TxnId::from_raw(1),
            PartitionId::new(0),
            SmallVec::new(),
            ActionPayload::Delete { table: TableId::new(0), key: Key::from_int(1) },
        );
        action.state = ActionState::Succeeded;
        action.reset();
        assert_eq!(action.state(), ActionState::Pending);
        assert_eq!(action.retry_count(), 0);
    }
}
