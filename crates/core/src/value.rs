//! Row and field value representation.
//!
//! Adapted from the teacher's canonical `Value` type: the same eight
//! variants, the same no-coercion equality rule, and the same IEEE-754
//! float semantics. The wire-encoding concerns that type carried (the
//! `$f64` JSON wrapper for `NaN`/`Inf`/`-0.0`) are dropped here — actions
//! read and write `Value`s directly against the storage adapter, there is
//! no JSON wire boundary in this kit.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A row field value.
///
/// Equality never coerces between variants: `Int(1) != Float(1.0)` and
/// `String("a") != Bytes(b"a")`. Float equality is IEEE-754 (`NaN != NaN`,
/// `-0.0 == 0.0`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean true or false.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit IEEE-754 floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Arbitrary binary data, distinct from `String`.
    Bytes(Vec<u8>),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// String-keyed map of values.
    Object(HashMap<String, Value>),
}

impl Value {
    /// The variant's name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// View as `bool`, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// View as `i64`, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// View as `f64`, if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// View as `&str`, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// View as `&[u8]`, if this is `Bytes`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// View as a slice of values, if this is an `Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// View as a field map, if this is an `Object`.
    pub fn as_object(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

// `Value` follows IEEE-754 equality, under which `NaN != NaN` — this
// violates the `Eq` reflexivity contract in the presence of `Float(NaN)`.
// The teacher type makes the same tradeoff so that `Value` can be used as
// a `HashMap`/`HashSet` element without a separate ordered-float wrapper;
// callers storing `Float(NaN)` accept that it will never compare equal to
// itself.
impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => {
                if *f == 0.0 {
                    0u64.hash(state);
                } else {
                    f.to_bits().hash(state);
                }
            }
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Array(a) => {
                a.len().hash(state);
                for v in a {
                    v.hash(state);
                }
            }
            Value::Object(o) => {
                let mut entries: Vec<_> = o.iter().collect();
                entries.sort_by_key(|(k, _)| *k);
                entries.len().hash(state);
                for (k, v) in entries {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_coercion_between_int_and_float() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn no_coercion_between_string_and_bytes() {
        assert_ne!(Value::String("abc".into()), Value::Bytes(b"abc".to_vec()));
    }

    #[test]
    fn float_equality_is_ieee754() {
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn accessors_return_none_for_wrong_variant() {
        let v = Value::Int(1);
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_int(), Some(1));
    }

    #[test]
    fn object_hash_is_order_independent() {
        let mut a = HashMap::new();
        a.insert("x".to_string(), Value::Int(1));
        a.insert("y".to_string(), Value::Int(2));
        let mut b = HashMap::new();
        b.insert("y".to_string(), Value::Int(2));
        b.insert("x".to_string(), Value::Int(1));
        assert_eq!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn type_name_matches_variant() {
        assert_eq!(Value::Null.type_name(), "Null");
        assert_eq!(Value::Array(vec![]).type_name(), "Array");
    }
}
