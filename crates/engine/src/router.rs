//! Router: immutable {table × key → partition} mapping (component C7).
//!
//! Built once at database load and never mutated afterward, so routing a
//! key touches no lock — every partition worker and client thread reads
//! the same `Arc<Router>` concurrently with no coordination at all.

use dora_core::{CoreError, Key, PartitionId, Result, TableId};
use rustc_hash::FxHashMap;

/// How one table's keyspace is divided across its partitions.
#[derive(Debug, Clone)]
enum Partitioning {
    /// `partition = clamp(key / keys_per_partition, 0, partition_count-1)`.
    /// Used for tables with a dense numeric primary key, where this gives
    /// contiguous key ranges per partition and lets a range scan within
    /// one partition avoid touching any other.
    Numeric { keys_per_partition: i64, partition_count: u32 },
    /// `partition = stable_hash(key) % partition_count`. Used for
    /// tables without a meaningful numeric ordering.
    Hash { partition_count: u32 },
}

impl Partitioning {
    fn route(&self, key: &Key) -> PartitionId {
        match self {
            Partitioning::Numeric { keys_per_partition, partition_count } => {
                let leading = key.leading_int().unwrap_or(0);
                let raw = leading.div_euclid(*keys_per_partition);
                let clamped = raw.clamp(0, *partition_count as i64 - 1);
                PartitionId::new(clamped as u32)
            }
            Partitioning::Hash { partition_count } => {
                let bytes = key.to_stable_bytes();
                let hash = fxhash_bytes(&bytes);
                PartitionId::new((hash % *partition_count as u64) as u32)
            }
        }
    }

    fn partition_count(&self) -> u32 {
        match self {
            Partitioning::Numeric { partition_count, .. } => *partition_count,
            Partitioning::Hash { partition_count } => *partition_count,
        }
    }
}

/// `rustc_hash`'s FxHash algorithm over a byte slice, used so routing
/// never pulls in a generic `Hasher`/`BuildHasher` dance for one-shot
/// hashing.
fn fxhash_bytes(bytes: &[u8]) -> u64 {
    use std::hash::Hasher;
    let mut hasher = rustc_hash::FxHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// The immutable router.
pub struct Router {
    tables: FxHashMap<TableId, Partitioning>,
}

impl Router {
    /// Route `key` within `table` to its owning partition.
    pub fn route(&self, table: TableId, key: &Key) -> Result<PartitionId> {
        self.tables
            .get(&table)
            .map(|p| p.route(key))
            .ok_or_else(|| CoreError::Fatal(format!("no partitioning registered for {table}")))
    }

    /// Number of partitions configured for `table`.
    pub fn partition_count(&self, table: TableId) -> Result<u32> {
        self.tables
            .get(&table)
            .map(|p| p.partition_count())
            .ok_or_else(|| CoreError::Fatal(format!("no partitioning registered for {table}")))
    }

    /// Every table this router knows about.
    pub fn tables(&self) -> impl Iterator<Item = TableId> + '_ {
        self.tables.keys().copied()
    }
}

/// Builds a [`Router`] from per-table configuration. Mirrors the
/// `partitions_per_table` / `scaling_factor` options (§6): `scaling_factor`
/// sizes a numeric table's key range (`scaling_factor` rows per
/// partition), `partitions_per_table` fixes the partition count.
pub struct RouterBuilder {
    tables: FxHashMap<TableId, Partitioning>,
}

impl RouterBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        RouterBuilder { tables: FxHashMap::default() }
    }

    /// Register `table` with numeric range partitioning: `partition_count`
    /// partitions, each owning `scaling_factor` keys.
    pub fn numeric_table(mut self, table: TableId, partition_count: u32, scaling_factor: i64) -> Self {
        self.tables.insert(
            table,
            Partitioning::Numeric {
                keys_per_partition: scaling_factor.max(1),
                partition_count: partition_count.max(1),
            },
        );
        self
    }

    /// Register `table` with hash partitioning across `partition_count`
    /// partitions.
    pub fn hash_table(mut self, table: TableId, partition_count: u32) -> Self {
        self.tables.insert(table, Partitioning::Hash { partition_count: partition_count.max(1) });
        self
    }

    /// Finish building. Consumes the builder since the result is meant
    /// to be wrapped in an `Arc` and never mutated again.
    pub fn build(self) -> Router {
        Router { tables: self.tables }
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
