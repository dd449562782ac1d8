//! Write-ahead log entries and the append-only log file.
//!
//! Adapted from the teacher's `WALEntry`: the same five-variant shape
//! (begin/write/delete/commit/abort), but keyed by `(TxnId, TableId, Key)`
//! instead of `RunId` — there is no run concept in this kit, a table and
//! partition key are the natural unit of change.

use byteorder::{BigEndian, WriteBytesExt};
use dora_core::{CoreError, Key, Result, TableId, TxnId, Value};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// One record in the write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WalEntry {
    /// Marks the start of a transaction.
    BeginTxn {
        /// The transaction starting.
        txn: TxnId,
    },
    /// Records a row write (insert or update).
    Write {
        /// Owning transaction.
        txn: TxnId,
        /// Table the row belongs to.
        table: TableId,
        /// Row key.
        key: Key,
        /// New row value.
        value: Value,
    },
    /// Records a row deletion.
    Delete {
        /// Owning transaction.
        txn: TxnId,
        /// Table the row belonged to.
        table: TableId,
        /// Deleted row's key.
        key: Key,
    },
    /// Marks a transaction durable: everything between the matching
    /// `BeginTxn` and this entry is now guaranteed to survive a crash,
    /// once the segment containing this entry has been forced.
    CommitTxn {
        /// The transaction committing.
        txn: TxnId,
    },
    /// Marks a transaction's writes as void; replay must discard them.
    AbortTxn {
        /// The transaction aborting.
        txn: TxnId,
    },
}

impl WalEntry {
    fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CoreError::Storage(format!("WAL encode failed: {e}")))
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| CoreError::Storage(format!("WAL decode failed: {e}")))
    }
}

/// An append-only log file, framed as `[len: u32][crc32: u32][payload]`
/// per record so that a torn write at the tail is detectable on replay
/// (a length or checksum mismatch on the last record means the writer
/// crashed mid-append; everything before it is still valid).
pub struct Wal {
    writer: Mutex<BufWriter<File>>,
}

impl Wal {
    /// Open (creating if absent) the log file at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CoreError::Storage(format!("failed to open WAL: {e}")))?;
        Ok(Wal {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one entry. Buffered — not guaranteed durable until
    /// [`Self::force`] returns.
    pub fn append(&self, entry: &WalEntry) -> Result<()> {
        let payload = entry.encode()?;
        let checksum = crc32fast::hash(&payload);
        let mut writer = self.writer.lock();
        writer
            .write_u32::<BigEndian>(payload.len() as u32)
            .and_then(|_| writer.write_u32::<BigEndian>(checksum))
            .and_then(|_| writer.write_all(&payload))
            .map_err(|e| CoreError::Storage(format!("WAL append failed: {e}")))
    }

    /// Flush buffered writes and fsync the underlying file. This is the
    /// durability linearization point: a client's commit is only durable
    /// once its `CommitTxn` entry has survived a `force` call.
    pub fn force(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer
            .flush()
            .map_err(|e| CoreError::Storage(format!("WAL flush failed: {e}")))?;
        writer
            .get_ref()
            .sync_data()
            .map_err(|e| CoreError::Storage(format!("WAL fsync failed: {e}")))
    }
}

/// Read every well-formed record from a log file, in append order.
/// Stops (without error) at the first truncated or checksum-mismatched
/// record, since that can only be an in-progress write at the tail.
pub fn replay(path: impl AsRef<Path>) -> Result<Vec<WalEntry>> {
    use byteorder::ReadBytesExt;
    use std::io::Read;

    let mut file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoreError::Storage(format!("failed to open WAL for replay: {e}"))),
    };

    let mut entries = Vec::new();
    loop {
        let len = match file.read_u32::<BigEndian>() {
            Ok(len) => len,
            Err(_) => break,
        };
        let checksum = match file.read_u32::<BigEndian>() {
            Ok(c) => c,
            Err(_) => break,
        };
        let mut payload = vec![0u8; len as usize];
        if file.read_exact(&mut payload).is_err() {
            break;
        }
        if crc32fast::hash(&payload) != checksum {
            break;
        }
        match WalEntry::decode(&payload) {
            Ok(entry) => entries.push(entry),
            Err(_) => break,
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_replay_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let wal = Wal::open(&path).unwrap();
        let txn = TxnId::from_raw(1);
        wal.append(&WalEntry::BeginTxn { txn }).unwrap();
        wal.append(&WalEntry::Write {
            txn,
            table: TableId::new(0),
            key: Key::from_int(1),
            value: Value::Int(42),
        })
        .unwrap();
        wal.append(&WalEntry::CommitTxn { txn }).unwrap();
        wal.force().unwrap();

        let entries = replay(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], WalEntry::BeginTxn { txn });
        assert_eq!(entries[2], WalEntry::CommitTxn { txn });
    }

    #[test]
    fn replay_of_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let entries = replay(dir.path().join("missing.log")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn replay_stops_at_truncated_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let wal = Wal::open(&path).unwrap();
        wal.append(&WalEntry::BeginTxn { txn: TxnId::from_raw(1) }).unwrap();
        wal.force().unwrap();
        drop(wal);

        // Truncate the file mid-record to simulate a crash during append.
        let file = OpenOptions::new().append(true).open(&path).unwrap();
        file.set_len(file.metadata().unwrap().len() - 1).unwrap();

        let entries = replay(&path).unwrap();
        assert!(entries.is_empty());
    }
}
