//! The tagged value produced by schema-driven decoding.
//!
//! Consumers of decoded table rows and action data always deal with
//! [`Value`], never with chain-specific byte layouts. Serialization follows
//! the conventional JSON rendering of the source chain: 64-bit integers as
//! quoted strings (so they survive JSON number precision), byte strings as
//! hex, variants as a `["alternative_name", value]` pair.

use std::fmt;

use chainfeed_wire::{BlockTimestamp, Name, PublicKey, Signature, TimePoint, TimePointSec};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A decoded, schema-tagged value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent optional or missing trailing extension field.
    Null,
    Bool(bool),
    /// int8..int32
    Int(i32),
    /// uint8..uint32 and varuint32
    Uint(u32),
    /// 64-bit integers, serialized as strings
    Int64(i64),
    Uint64(u64),
    /// 128-bit integers, carried as decimal strings
    BigInt(String),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Name(Name),
    TimePoint(TimePoint),
    TimePointSec(TimePointSec),
    BlockTimestamp(BlockTimestamp),
    /// Any checksum width, lowercase hex
    Checksum(String),
    PublicKey(PublicKey),
    Signature(Signature),
    /// `"4,EOS"` form
    Symbol(String),
    /// `"1.0000 EOS"` form
    Asset(String),
    Array(Vec<Value>),
    /// Struct fields in declaration order.
    Object(Vec<(String, Value)>),
    /// Selected variant alternative: name plus payload.
    Variant(String, Box<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Field lookup on an object value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(k, _)| k == field).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v as u64),
            Value::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<Name> {
        match self {
            Value::Name(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i32(*v),
            Value::Uint(v) => serializer.serialize_u32(*v),
            Value::Int64(v) => serializer.collect_str(v),
            Value::Uint64(v) => serializer.collect_str(v),
            Value::BigInt(s) => serializer.serialize_str(s),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&hex::encode(b)),
            Value::Name(n) => n.serialize(serializer),
            Value::TimePoint(t) => t.serialize(serializer),
            Value::TimePointSec(t) => t.serialize(serializer),
            Value::BlockTimestamp(t) => t.serialize(serializer),
            Value::Checksum(s) => serializer.serialize_str(s),
            Value::PublicKey(k) => k.serialize(serializer),
            Value::Signature(s) => s.serialize(serializer),
            Value::Symbol(s) | Value::Asset(s) => serializer.serialize_str(s),
            Value::Array(items) => items.serialize(serializer),
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Variant(name, inner) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(name)?;
                seq.serialize_element(inner.as_ref())?;
                seq.end()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "<unprintable>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_serializes_in_field_order() {
        let v = Value::Object(vec![
            ("b".into(), Value::Uint(2)),
            ("a".into(), Value::Uint(1)),
        ]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn u64_serializes_as_string() {
        let v = Value::Uint64(u64::MAX);
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            "\"18446744073709551615\""
        );
    }

    #[test]
    fn variant_serializes_as_pair() {
        let v = Value::Variant("transfer".into(), Box::new(Value::Uint(1)));
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"["transfer",1]"#);
    }

    #[test]
    fn field_lookup() {
        let v = Value::Object(vec![("abi".into(), Value::Bytes(vec![]))]);
        assert!(v.get("abi").is_some());
        assert!(v.get("code").is_none());
    }
}
