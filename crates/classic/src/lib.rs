//! The conventional executor: one OS thread per transaction, no
//! partitioning, no logical lock manager, no rendezvous graph —
//! whatever concurrency control the storage adapter itself provides is
//! all a transaction gets.
//!
//! This crate exists to give the DORA engine something to be compared
//! against, per the two-execution-architectures framing the kit is
//! built around. It is deliberately thin: there is no router, no action
//! object, no RVP — a transaction here is just a closure run to
//! completion on its own thread between `begin` and `commit`/`abort`.
//! Anything more elaborate belongs in `dora-engine`, not here.

#![warn(missing_docs)]
#![warn(clippy::all)]

use dora_core::{CoreError, Result, Value};
use dora_storage::{Storage, TxnHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A transaction body: given the storage adapter and this transaction's
/// handle, perform whatever reads/writes it needs and return its
/// result. Returning `Err` aborts the transaction; returning `Ok`
/// commits it.
pub type TransactionBody = dyn FnOnce(&dyn Storage, &TxnHandle) -> Result<Value> + Send;

/// Runs transactions one thread each, directly against a storage
/// adapter.
pub struct ClassicExecutor {
    storage: Arc<dyn Storage>,
    next_id: AtomicU64,
}

impl ClassicExecutor {
    /// Wrap a storage adapter.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        ClassicExecutor { storage, next_id: AtomicU64::new(0) }
    }

    /// Run `body` as its own transaction on a dedicated thread, blocking
    /// the caller until it finishes. Every call gets a fresh thread —
    /// there is no worker pool to amortize spawn cost over, which is
    /// exactly the cost this executor exists to let the engine's
    /// partition workers be compared against.
    pub fn run(&self, body: Box<TransactionBody>) -> Result<Value> {
        let storage = self.storage.clone();
        let name = format!("dora-classic-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let join = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                let handle = storage.begin()?;
                match body(storage.as_ref(), &handle) {
                    Ok(value) => {
                        storage.commit(&handle)?;
                        Ok(value)
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "classic transaction aborting");
                        let _ = storage.abort(&handle);
                        Err(e)
                    }
                }
            })
            .expect("failed to spawn classic transaction thread");
        join.join().unwrap_or_else(|_| Err(CoreError::Fatal("classic transaction thread panicked".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dora_core::{Key, TableId};
    use dora_storage::InMemoryStorage;

    const ACCOUNTS: TableId = TableId::new(0);

    fn seeded_executor() -> ClassicExecutor {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let seed = storage.begin().unwrap();
        storage.insert(&seed, ACCOUNTS, Key::from_int(1), Value::Int(100)).unwrap();
        storage.commit(&seed).unwrap();
        ClassicExecutor::new(storage)
    }

    #[test]
    fn commits_a_successful_update() {
        let executor = seeded_executor();
        let result = executor.run(Box::new(|storage: &dyn Storage, handle: &TxnHandle| {
            let current = storage.get(handle, ACCOUNTS, &Key::from_int(1))?;
            let updated = current.as_int().unwrap() + 10;
            storage.update(handle, ACCOUNTS, &Key::from_int(1), Value::Int(updated))?;
            Ok(Value::Int(updated))
        }));
        assert_eq!(result.unwrap(), Value::Int(110));
    }

    #[test]
    fn aborts_and_leaves_storage_unchanged_on_error() {
        let executor = seeded_executor();
        let result = executor.run(Box::new(|storage: &dyn Storage, handle: &TxnHandle| {
            let current = storage.get(handle, ACCOUNTS, &Key::from_int(1))?;
            let balance = current.as_int().unwrap();
            if balance < 1000 {
                return Err(CoreError::ConstraintViolation("insufficient balance".into()));
            }
            storage.update(handle, ACCOUNTS, &Key::from_int(1), Value::Int(balance - 1000)).map(|_| Value::Null)
        }));
        assert!(result.is_err());
    }

    #[test]
    fn many_transactions_run_concurrently_on_distinct_threads() {
        let executor = Arc::new(seeded_executor());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let executor = executor.clone();
            handles.push(std::thread::spawn(move || {
                executor.run(Box::new(|storage: &dyn Storage, handle: &TxnHandle| {
                    storage.get(handle, ACCOUNTS, &Key::from_int(1))
                }))
            }));
        }
        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }
    }
}
