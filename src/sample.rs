//! Sample values.
//!
//! A [`Sample`] is an example payload: a nested tree of scalars, arrays and
//! objects supplied once at registration time to describe a message shape.
//! Object keys keep their encounter order, which becomes the field numbering
//! of the inferred message.
//!
//! Equality on samples is structural: objects compare key-for-key regardless
//! of order, and integers compare equal to floats holding the same value.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// An enum-like value: a variant name tagged with the enum type it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub type_name: String,
    pub variant: String,
}

impl Symbol {
    pub fn new(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            variant: variant.into(),
        }
    }
}

/// A plain-data sample value.
#[derive(Debug, Clone)]
pub enum Sample {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Symbol(Symbol),
    Array(Vec<Sample>),
    Object(Vec<(String, Sample)>),
}

impl Sample {
    /// Builds an object from `(key, value)` pairs, keeping their order.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Sample)>,
    {
        Sample::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn symbol(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
        Sample::Symbol(Symbol::new(type_name, variant))
    }

    pub fn as_object(&self) -> Option<&[(String, Sample)]> {
        match self {
            Sample::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up an object member by key.
    pub fn get(&self, key: &str) -> Option<&Sample> {
        self.as_object()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Short description of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Sample::Null => "null",
            Sample::Bool(_) => "boolean",
            Sample::Int(_) => "integer",
            Sample::Float(_) => "float",
            Sample::String(_) => "string",
            Sample::Bytes(_) => "bytes",
            Sample::Symbol(_) => "symbol",
            Sample::Array(_) => "array",
            Sample::Object(_) => "object",
        }
    }

    /// Renders bytes as base64 strings, the form decoded messages take.
    pub fn normalized(&self) -> Sample {
        match self {
            Sample::Bytes(bytes) => Sample::String(STANDARD.encode(bytes)),
            Sample::Array(items) => Sample::Array(items.iter().map(Sample::normalized).collect()),
            Sample::Object(entries) => Sample::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.normalized()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Sample::Null => Value::Null,
            Sample::Bool(b) => Value::Bool(*b),
            Sample::Int(i) => Value::Number((*i).into()),
            Sample::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Sample::String(s) => Value::String(s.clone()),
            Sample::Bytes(bytes) => Value::String(STANDARD.encode(bytes)),
            Sample::Symbol(symbol) => Value::String(symbol.variant.clone()),
            Sample::Array(items) => Value::Array(items.iter().map(Sample::to_json).collect()),
            Sample::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                Value::Object(map)
            }
        }
    }
}

/// Returns the integer an f64 holds exactly, if any.
pub(crate) fn exact_i64(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; everything below it that has no
    // fractional part converts without loss.
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn numbers_eq(int: i64, float: f64) -> bool {
    exact_i64(float) == Some(int)
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Sample::Null, Sample::Null) => true,
            (Sample::Bool(a), Sample::Bool(b)) => a == b,
            (Sample::Int(a), Sample::Int(b)) => a == b,
            (Sample::Float(a), Sample::Float(b)) => a == b,
            (Sample::Int(i), Sample::Float(f)) | (Sample::Float(f), Sample::Int(i)) => {
                numbers_eq(*i, *f)
            }
            (Sample::String(a), Sample::String(b)) => a == b,
            (Sample::Bytes(a), Sample::Bytes(b)) => a == b,
            (Sample::Symbol(a), Sample::Symbol(b)) => a == b,
            (Sample::Array(a), Sample::Array(b)) => a == b,
            (Sample::Object(a), Sample::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter().any(|(other_key, other_value)| {
                            key == other_key && value == other_value
                        })
                    })
            }
            _ => false,
        }
    }
}

impl From<Value> for Sample {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Sample::Null,
            Value::Bool(b) => Sample::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Sample::Int(i),
                // u64 above i64::MAX or a real float
                None => Sample::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Sample::String(s),
            Value::Array(items) => Sample::Array(items.into_iter().map(Sample::from).collect()),
            Value::Object(map) => {
                Sample::Object(map.into_iter().map(|(k, v)| (k, Sample::from(v))).collect())
            }
        }
    }
}

impl From<&Sample> for Value {
    fn from(sample: &Sample) -> Self {
        sample.to_json()
    }
}

impl From<bool> for Sample {
    fn from(value: bool) -> Self {
        Sample::Bool(value)
    }
}

impl From<i64> for Sample {
    fn from(value: i64) -> Self {
        Sample::Int(value)
    }
}

impl From<f64> for Sample {
    fn from(value: f64) -> Self {
        Sample::Float(value)
    }
}

impl From<&str> for Sample {
    fn from(value: &str) -> Self {
        Sample::String(value.to_string())
    }
}

impl From<String> for Sample {
    fn from(value: String) -> Self {
        Sample::String(value)
    }
}

impl From<Vec<u8>> for Sample {
    fn from(value: Vec<u8>) -> Self {
        Sample::Bytes(value)
    }
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Sample {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Sample::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_equality_ignores_key_order() {
        let a = Sample::from(json!({"id": 1, "name": "x"}));
        let b = Sample::from(json!({"name": "x", "id": 1}));
        assert_eq!(a, b);

        let c = Sample::from(json!({"name": "x"}));
        assert_ne!(a, c);
    }

    #[test]
    fn test_json_keeps_key_order() {
        let sample = Sample::from(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let keys: Vec<&str> = sample
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(Sample::Int(2), Sample::Float(2.0));
        assert_ne!(Sample::Int(2), Sample::Float(2.5));
        assert_ne!(Sample::Int(i64::MAX), Sample::Float(i64::MAX as f64));
    }

    #[test]
    fn test_large_unsigned_becomes_float() {
        let sample = Sample::from(json!(u64::MAX));
        assert!(matches!(sample, Sample::Float(_)));
    }

    #[test]
    fn test_normalized_renders_bytes() {
        let sample = Sample::object([("blob", Sample::Bytes(b"hi".to_vec()))]);
        assert_eq!(sample.normalized().get("blob"), Some(&Sample::from("aGk=")));
    }

    #[test]
    fn test_symbol_serializes_as_variant() {
        let sample = Sample::object([("color", Sample::symbol("Color", "RED"))]);
        assert_eq!(sample.to_json(), json!({"color": "RED"}));
    }
}
