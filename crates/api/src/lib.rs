//! Client-facing transaction API.
//!
//! The engine crate exposes `Database::submit`/`run` over a raw
//! [`dora_engine::GraphFn`] closure; this crate is the layer above it
//! that a caller actually talks to — named transaction types and their
//! inputs ([`graphs::TransactionRequest`]), dispatched through
//! [`client::Client`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod graphs;

pub use client::Client;
pub use graphs::{build_graph, TransactionRequest};
pub use dora_engine::{AbortReason, TransactionOutcome};
