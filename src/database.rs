//! Main database entry point for Dora.
//!
//! This module provides the `Dora` struct, the primary entry point for
//! submitting and running transactions.

use crate::error::{Error, Result};
use dora_api::{Client, TransactionOutcome, TransactionRequest};
use dora_core::TableId;
use dora_durability::DurabilityMode;
use dora_engine::{DatabaseConfig, MetricsSnapshot, PendingOutcome};
use dora_storage::{InMemoryStorage, Storage};
use std::sync::Arc;

/// The Dora database.
///
/// This is the main entry point for submitting transaction requests.
/// Build one with [`Dora::builder`] over a storage adapter, or reach
/// for [`Dora::ephemeral`] for a quick in-memory instance with no
/// tables registered.
///
/// # Example
///
/// ```ignore
/// use dora::prelude::*;
///
/// let db = Dora::builder(storage)
///     .numeric_table(accounts, Some(4))
///     .build();
///
/// let outcome = db.run(TransactionRequest::UpdateBalance {
///     table: accounts,
///     key: Key::from_int(1),
///     delta: 10,
/// });
/// db.shutdown();
/// ```
pub struct Dora {
    client: Client,
}

impl Dora {
    /// Start configuring a database over an already-open storage
    /// adapter.
    pub fn builder(storage: Arc<dyn Storage>) -> DoraBuilder {
        DoraBuilder::new(storage)
    }

    /// A database over a fresh, empty, in-memory storage adapter with
    /// no tables registered. Handy for quick experiments; use
    /// [`Dora::builder`] directly when tables need to be partitioned up
    /// front.
    pub fn ephemeral() -> Arc<Self> {
        Self::builder(Arc::new(InMemoryStorage::new())).build()
    }

    /// Non-blocking: build and submit `request`'s graph, returning a
    /// handle whose `wait()` blocks for the outcome.
    pub fn submit(&self, request: TransactionRequest) -> PendingOutcome {
        self.client.submit(request)
    }

    /// Blocking: submit and wait for the outcome.
    pub fn run(&self, request: TransactionRequest) -> TransactionOutcome {
        self.client.run(request)
    }

    /// Blocking, `?`-friendly form of [`Dora::run`]: `Ok(())` on
    /// commit, `Err(Error::Aborted(reason))` otherwise.
    pub fn run_result(&self, request: TransactionRequest) -> Result<()> {
        Error::from_outcome(self.run(request))
    }

    /// The durability trade-off this database was configured with.
    pub fn durability_mode(&self) -> DurabilityMode {
        self.client.database().durability_mode()
    }

    /// The underlying engine database, for callers that need to submit a
    /// raw [`dora_engine::GraphFn`] rather than a [`TransactionRequest`].
    pub fn engine(&self) -> &Arc<dora_engine::Database> {
        self.client.database()
    }

    /// A snapshot of the transaction counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.client.database().metrics()
    }

    /// Tear every partition worker down and join its thread.
    pub fn shutdown(&self) {
        self.client.database().shutdown()
    }
}

/// Builds a [`Dora`]: register each table's partitioning, set
/// process-wide configuration, then [`DoraBuilder::build`].
pub struct DoraBuilder {
    inner: dora_engine::DatabaseBuilder,
}

impl DoraBuilder {
    fn new(storage: Arc<dyn Storage>) -> Self {
        DoraBuilder { inner: dora_engine::Database::builder(storage) }
    }

    /// Replace the default configuration wholesale.
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.inner = self.inner.config(config);
        self
    }

    /// Register a table with numeric range partitioning. `partitions`
    /// overrides the default of the active CPU count.
    pub fn numeric_table(mut self, table: TableId, partitions: Option<u32>) -> Self {
        self.inner = self.inner.numeric_table(table, partitions);
        self
    }

    /// Register a table with hash partitioning.
    pub fn hash_table(mut self, table: TableId, partitions: Option<u32>) -> Self {
        self.inner = self.inner.hash_table(table, partitions);
        self
    }

    /// Build the database and spawn every partition worker.
    pub fn build(self) -> Arc<Dora> {
        let database = self.inner.build();
        Arc::new(Dora { client: Client::new(database) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dora_core::{Key, Value};

    const ACCOUNTS: TableId = TableId::new(0);

    fn seeded_db() -> Arc<Dora> {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let seed = storage.begin().unwrap();
        for id in 0..100 {
            storage.insert(&seed, ACCOUNTS, Key::from_int(id), Value::Int(100)).unwrap();
        }
        storage.commit(&seed).unwrap();
        Dora::builder(storage)
            .numeric_table(ACCOUNTS, Some(4))
            .config(DatabaseConfig { scaling_factor: 25, ..Default::default() })
            .build()
    }

    #[test]
    fn runs_an_update_balance_request_to_commit() {
        let db = seeded_db();
        let outcome = db.run(TransactionRequest::UpdateBalance {
            table: ACCOUNTS,
            key: Key::from_int(42),
            delta: 10,
        });
        assert_eq!(outcome, TransactionOutcome::Committed);
        assert_eq!(db.metrics().committed, 1);
        db.shutdown();
    }

    #[test]
    fn run_result_surfaces_an_abort_as_an_error() {
        let db = seeded_db();
        let result = db.run_result(TransactionRequest::UpdateBalance {
            table: ACCOUNTS,
            key: Key::from_int(42),
            delta: -1000,
        });
        assert!(matches!(result, Err(Error::Aborted(dora_engine::AbortReason::ConstraintViolation(_)))));
        db.shutdown();
    }

    #[test]
    fn ephemeral_builds_with_no_tables_registered() {
        let db = Dora::ephemeral();
        assert_eq!(db.metrics().committed, 0);
        db.shutdown();
    }
}
