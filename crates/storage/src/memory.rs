//! In-memory reference implementation of the storage adapter.
//!
//! Grounded on the teacher's `ShardedStore`: a `DashMap` keyed by a small
//! dense id (there it was per-run, here it's per-table) holding an
//! `FxHashMap` of rows, so that distinct tables never contend with each
//! other and reads never block behind a global lock. One shard's
//! `FxHashMap` is itself guarded by a `parking_lot::Mutex` rather than
//! being lock-free internally — unlike the teacher's MVCC store, DORA
//! never needs a concurrent reader to see a consistent snapshot mid-write:
//! every write to a key arrives from the one partition worker holding that
//! key's logical lock, so contention within a shard is already
//! structurally serialized and a plain mutex adds no real latency here.
//!
//! Every `insert`/`update`/`delete` records the row's prior state onto its
//! handle's undo log (see [`crate::handle::UndoEntry`]) before applying
//! the write. `abort` drains that log and replays it in reverse so a
//! transaction that already applied some of its writes before a later
//! action failed is left with no visible effect at all — writes land
//! directly in the shared table rather than a private workspace, so the
//! undo log is what makes `abort` actually mean "nothing happened" rather
//! than "nothing happened from here on."

use crate::adapter::{ScanDirection, ScanRow, Storage};
use crate::handle::{HandleStatus, TxnHandle, UndoEntry};
use dashmap::DashMap;
use dora_core::ids::TxnIdAllocator;
use dora_core::{CoreError, Key, Result, TableId, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Default)]
struct Shard {
    rows: Mutex<FxHashMap<Key, Value>>,
}

/// A single-process, non-durable `Storage` implementation. Used for
/// development and testing, and as the adapter the classic executor
/// benchmarks against; production durability is the job of the adapter
/// paired with [`crate::DurabilityMode`] in `dora-durability`, not this
/// type.
pub struct InMemoryStorage {
    tables: DashMap<TableId, Shard>,
    txn_ids: TxnIdAllocator,
}

impl InMemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        InMemoryStorage {
            tables: DashMap::new(),
            txn_ids: TxnIdAllocator::default(),
        }
    }

    fn shard(&self, table: TableId) -> dashmap::mapref::one::RefMut<'_, TableId, Shard> {
        self.tables.entry(table).or_default()
    }

    /// Reverse one recorded write. Applied directly against the shard,
    /// bypassing `insert`/`update`/`delete` entirely — this is the undo
    /// itself, not a new write that needs its own undo entry.
    fn apply_undo(&self, entry: UndoEntry) {
        match entry {
            UndoEntry::Inserted { table, key } => {
                self.shard(table).rows.lock().remove(&key);
            }
            UndoEntry::Overwrote { table, key, previous } | UndoEntry::Removed { table, key, previous } => {
                self.shard(table).rows.lock().insert(key, previous);
            }
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for InMemoryStorage {
    fn begin(&self) -> Result<Arc<TxnHandle>> {
        Ok(Arc::new(TxnHandle::new(self.txn_ids.alloc())))
    }

    fn commit(&self, handle: &TxnHandle) -> Result<()> {
        if handle.status() != HandleStatus::Open {
            return Err(CoreError::Fatal(format!(
                "commit called on handle {} with status {:?}",
                handle.txn_id(),
                handle.status()
            )));
        }
        handle.mark_committed();
        Ok(())
    }

    fn abort(&self, handle: &TxnHandle) -> Result<()> {
        if handle.status() == HandleStatus::Committed {
            return Err(CoreError::Fatal(format!(
                "abort called on already-committed handle {}",
                handle.txn_id()
            )));
        }
        for entry in handle.drain_undo_log() {
            self.apply_undo(entry);
        }
        handle.mark_aborted();
        Ok(())
    }

    fn get(&self, _handle: &TxnHandle, table: TableId, key: &Key) -> Result<Value> {
        let shard = self.shard(table);
        shard
            .rows
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("{table}/{key:?}")))
    }

    fn insert(&self, handle: &TxnHandle, table: TableId, key: Key, row: Value) -> Result<()> {
        let shard = self.shard(table);
        let mut rows = shard.rows.lock();
        let undo = match rows.insert(key.clone(), row) {
            Some(previous) => UndoEntry::Overwrote { table, key, previous },
            None => UndoEntry::Inserted { table, key },
        };
        drop(rows);
        handle.record_undo(undo);
        Ok(())
    }

    fn update(&self, handle: &TxnHandle, table: TableId, key: &Key, row: Value) -> Result<()> {
        let shard = self.shard(table);
        let mut rows = shard.rows.lock();
        let previous = rows
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("{table}/{key:?}")))?;
        rows.insert(key.clone(), row);
        drop(rows);
        handle.record_undo(UndoEntry::Overwrote { table, key: key.clone(), previous });
        Ok(())
    }

    fn delete(&self, handle: &TxnHandle, table: TableId, key: &Key) -> Result<()> {
        let shard = self.shard(table);
        let previous = shard
            .rows
            .lock()
            .remove(key)
            .ok_or_else(|| CoreError::NotFound(format!("{table}/{key:?}")))?;
        handle.record_undo(UndoEntry::Removed { table, key: key.clone(), previous });
        Ok(())
    }

    fn scan(
        &self,
        _handle: &TxnHandle,
        table: TableId,
        low: &Key,
        high: &Key,
        dir: ScanDirection,
    ) -> Result<Vec<ScanRow>> {
        let shard = self.shard(table);
        let rows = shard.rows.lock();
        let mut matches: Vec<ScanRow> = rows
            .iter()
            .filter(|(k, _)| *k >= low && *k <= high)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        if dir == ScanDirection::Backward {
            matches.reverse();
        }
        Ok(matches)
    }

    fn force_log(&self) -> Result<()> {
        // No log at this layer; a real adapter backed by
        // `dora-durability`'s WAL does the actual fsync here.
        Ok(())
    }
}
