//! # Dora
//!
//! Research transaction-processing kit built around a Data-ORiented
//! Architecture (DORA): horizontally partitioned tables, one
//! single-threaded worker per partition, and transactions expressed as
//! a DAG of single-partition actions joined by rendezvous points. A
//! conventional thread-per-transaction executor ([`dora_classic`])
//! ships alongside it so the two architectures can be run against the
//! same storage adapter and compared.
//!
//! This crate is the top-level facade: it wires a storage adapter,
//! table partitioning, and process-wide configuration into a running
//! [`Dora`], and hands back the client-facing
//! [`TransactionRequest`]/[`TransactionOutcome`] surface. Everything
//! below it — the router, partition workers, lock manager, action/RVP
//! graph, group-commit flusher — lives in `dora-engine`,
//! `dora-concurrency`, and `dora-durability` and is reachable here only
//! through `Dora`'s methods.
//!
//! ## Quick start
//!
//! ```ignore
//! use dora::prelude::*;
//!
//! let db = Dora::ephemeral();
//! db.run_result(TransactionRequest::UpdateBalance {
//!     table: accounts_table,
//!     key: Key::from_int(1),
//!     delta: 10,
//! })?;
//! db.shutdown();
//! ```

#![warn(missing_docs)]

mod database;
mod error;
mod types;

pub mod prelude;

pub use database::{Dora, DoraBuilder};
pub use error::{Error, Result};
pub use types::*;
