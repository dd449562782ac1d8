//! Thin client wrapper: `submit`/`run` over [`TransactionRequest`]s,
//! the client-facing surface the design calls out as "the only
//! external surface of the core".

use crate::graphs::{build_graph, TransactionRequest};
use dora_engine::{Database, PendingOutcome, TransactionOutcome};
use std::sync::Arc;

/// A handle to a running database, exposing only the request/outcome
/// surface — no direct access to partitions, the router, or the
/// coordinator.
#[derive(Clone)]
pub struct Client {
    database: Arc<Database>,
}

impl Client {
    /// Wrap an already-running database.
    pub fn new(database: Arc<Database>) -> Self {
        Client { database }
    }

    /// Non-blocking: build and submit `request`'s graph, returning a
    /// handle whose `wait()` blocks for the outcome.
    pub fn submit(&self, request: TransactionRequest) -> PendingOutcome {
        self.database.submit(build_graph(request))
    }

    /// Blocking: submit and wait for the outcome.
    pub fn run(&self, request: TransactionRequest) -> TransactionOutcome {
        self.database.run(build_graph(request))
    }

    /// The database this client was built over.
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }
}
