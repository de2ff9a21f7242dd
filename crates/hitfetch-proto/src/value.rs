//! Field values.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use serde_json::Value as JsonValue;

/// One value of a stored or fetched field.
///
/// Multi-valued fields are an ordered `Vec<Value>` on the owning
/// [`HitField`](crate::HitField), so there is no array variant and the type
/// stays non-recursive for rkyv.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    /// Integers above `i64::MAX`.
    UInt64(u64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Integer view; floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        if let Value::Int64(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    /// Convert a JSON leaf.
    ///
    /// Objects and arrays are kept as their compact JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => n
                .as_i64()
                .map(Value::Int64)
                .or_else(|| n.as_u64().map(Value::UInt64))
                .unwrap_or_else(|| Value::Float64(n.as_f64().unwrap_or(f64::NAN))),
            JsonValue::String(s) => Value::String(s.clone()),
            container => Value::String(container.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int64(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Value::UInt64(n), Value::Int64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
