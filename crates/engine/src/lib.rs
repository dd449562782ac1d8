//! The DORA execution engine: router, partitions, actions, RVPs, and the
//! transaction coordinator (components C4–C9 of the design).
//!
//! - [`action`] — one-partition units of work (C5).
//! - [`rvp`] — join barriers that sequence a transaction's waves (C6).
//! - [`router`] — the immutable `{table × key → partition}` map (C7).
//! - [`partition`] — the single-threaded per-partition worker (C4).
//! - [`transaction`] — a transaction's status and storage handle.
//! - [`arena`] — the per-transaction wrapper over the action object pool.
//! - [`coordinator`] — builds and drives transaction graphs (C8).
//! - [`metrics`] — transaction counters.
//! - [`database`] — top-level facade wiring everything together.
//!
//! Group commit (C9) lives in `dora-durability`; the coordinator holds an
//! `Arc<GroupCommitFlusher>` and calls it at commit time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod arena;
pub mod coordinator;
pub mod database;
pub mod metrics;
pub mod partition;
pub mod router;
pub mod rvp;
pub mod transaction;

pub use action::{Action, ActionOutcome, ActionPayload, ActionState, LockDecl};
pub use arena::{new_action_pool, TransactionArena};
pub use coordinator::{Coordinator, GraphContext, GraphFn, PendingOutcome, TransactionOutcome};
pub use database::{Database, DatabaseBuilder, DatabaseConfig};
pub use metrics::{Metrics, MetricsSnapshot};
pub use partition::{Partition, TransactionRegistry};
pub use router::{Router, RouterBuilder};
pub use rvp::{Rvp, RvpContinuation, RvpHandle};
pub use transaction::{AbortReason, Transaction, TransactionStatus};
