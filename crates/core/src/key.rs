//! Composite ordered keys and key ranges.
//!
//! A [`Key`] is an ordered sequence of typed fields, compared
//! lexicographically field-by-field. Grounded on the original DORA
//! `key_wrapper_t<DataType>` (`dora/key.h` in the source this spec was
//! distilled from): comparison walks both field vectors together and stops
//! at the first unequal pair, so a shorter key naturally compares as a
//! *prefix* of a longer one with matching leading fields rather than
//! erroring on length mismatch.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One field of a composite key.
///
/// Fixed-size variants (`Int`) sort numerically; `Bytes`/`Str` sort
/// lexicographically by their byte representation. Mixing field kinds
/// within a single comparison is a caller bug (it will compare by
/// discriminant order), not a panic — routing code is expected to only
/// ever compare keys built from the same table's key template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyField {
    /// A signed integer field (the common case: primary-key ids).
    Int(i64),
    /// A UTF-8 string field.
    Str(String),
    /// An arbitrary byte-string field.
    Bytes(Vec<u8>),
}

impl KeyField {
    /// Stable byte serialization, used as the lock-table key and for
    /// on-disk WAL encoding. Prefixes each field with a type tag so that
    /// distinct `KeyField` variants never collide under concatenation.
    pub fn to_stable_bytes(&self) -> Vec<u8> {
        match self {
            KeyField::Int(v) => {
                let mut buf = Vec::with_capacity(9);
                buf.push(0u8);
                // Flip the sign bit so byte-lexicographic order matches
                // numeric order for negative values too.
                buf.extend_from_slice(&(*v as u64 ^ (1 << 63)).to_be_bytes());
                buf
            }
            KeyField::Str(s) => {
                let mut buf = Vec::with_capacity(1 + s.len());
                buf.push(1u8);
                buf.extend_from_slice(s.as_bytes());
                buf
            }
            KeyField::Bytes(b) => {
                let mut buf = Vec::with_capacity(1 + b.len());
                buf.push(2u8);
                buf.extend_from_slice(b);
                buf
            }
        }
    }
}

impl From<i64> for KeyField {
    fn from(v: i64) -> Self {
        KeyField::Int(v)
    }
}

impl From<&str> for KeyField {
    fn from(v: &str) -> Self {
        KeyField::Str(v.to_string())
    }
}

/// A composite ordered key: a row key or an index key, depending on the
/// table being addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    fields: Vec<KeyField>,
}

impl Key {
    /// Build a key from its fields, in order.
    pub fn new(fields: impl Into<Vec<KeyField>>) -> Self {
        Key { fields: fields.into() }
    }

    /// Build a single-field integer key — the common case for a
    /// numeric-primary-key table.
    pub fn from_int(id: i64) -> Self {
        Key { fields: vec![KeyField::Int(id)] }
    }

    /// The key's fields, in order.
    pub fn fields(&self) -> &[KeyField] {
        &self.fields
    }

    /// Number of fields.
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Prefix comparison: `self` is a prefix of `other` if every one of
    /// `self`'s fields equals the field at the same position in `other`.
    /// A 2-field key is a prefix of any 3-field key sharing its first two
    /// fields, regardless of the third.
    pub fn is_prefix_of(&self, other: &Key) -> bool {
        if self.fields.len() > other.fields.len() {
            return false;
        }
        self.fields.iter().zip(other.fields.iter()).all(|(a, b)| a == b)
    }

    /// Stable byte serialization for use as a lock-table key or WAL
    /// payload. Concatenates each field's stable encoding with its length
    /// so no field boundary can be confused with another.
    pub fn to_stable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for field in &self.fields {
            let encoded = field.to_stable_bytes();
            buf.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
            buf.extend_from_slice(&encoded);
        }
        buf
    }

    /// Extract the leading numeric field, if the key's first field is an
    /// integer. Used by [`crate::key::KeyRange`] membership tests and by
    /// the router's numeric-partitioning scheme.
    pub fn leading_int(&self) -> Option<i64> {
        match self.fields.first() {
            Some(KeyField::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Lexicographic ordering over field sequences, matching the original
/// `key_wrapper_t::operator<`: walk fields pairwise, return at the first
/// inequality; a key that runs out of fields while still equal on the
/// shared prefix sorts first (matches `Vec`/slice `Ord`, which `Key`
/// defers to).
impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fields.cmp(&other.fields)
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An inclusive `[low, high]` key range, used to describe one partition's
/// slice of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    low: Key,
    high: Key,
}

impl KeyRange {
    /// Build an inclusive range. `low` must not sort after `high`.
    pub fn new(low: Key, high: Key) -> Self {
        debug_assert!(low <= high, "KeyRange low must not exceed high");
        KeyRange { low, high }
    }

    /// Inclusive lower bound.
    pub fn low(&self) -> &Key {
        &self.low
    }

    /// Inclusive upper bound.
    pub fn high(&self) -> &Key {
        &self.high
    }

    /// Membership test: `low <= key <= high`. O(field count).
    pub fn contains(&self, key: &Key) -> bool {
        &self.low <= key && key <= &self.high
    }
}

/// The mode a logical lock is held or requested in.
///
/// Shared locks are held by any number of concurrent readers; Exclusive
/// locks are held by at most one writer and exclude all other holders.
/// `Shared`/`Shared` is the only compatible pair (see
/// [`crate::key::LockMode::compatible_with`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Multiple readers may hold this mode concurrently.
    Shared,
    /// At most one holder; excludes all other holders (Shared or
    /// Exclusive).
    Exclusive,
}

impl LockMode {
    /// Whether two requests in these modes may be granted simultaneously.
    pub fn compatible_with(self, other: LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}
