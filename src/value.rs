//! Dynamic control values carried by haps
//!
//! Most patterns in a performance end up as `Pattern<Value>`: a scalar
//! (note number, sample name) or a parameter map (`{s: "bd", gain: 0.8}`) the
//! external audio engine reads. Maps are ordered so rendered output and hashes
//! are stable.

use crate::pattern::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered parameter map
pub type ValueMap = BTreeMap<String, Value>;

/// A control value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Map(ValueMap),
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Truthiness used by `struct_values`/`mask_values`: zero, empty, `~`
    /// and `false` are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty() && s != "~",
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Look up a key of a map value
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Set a key, promoting a scalar to `{value: scalar, key: v}`
    pub fn with_param(self, key: impl Into<String>, value: Value) -> Value {
        let mut map = self.into_map();
        map.insert(key.into(), value);
        Value::Map(map)
    }

    /// Merge two values; keys of `other` win. Scalars are promoted first.
    pub fn union(self, other: Value) -> Value {
        let mut map = self.into_map();
        map.extend(other.into_map());
        Value::Map(map)
    }

    /// Multiply the `gain` key (default 1.0) by `factor`
    pub fn scale_gain(self, factor: f64) -> Value {
        let gain = self.param("gain").and_then(Value::as_f64).unwrap_or(1.0);
        self.with_param("gain", Value::Float(gain * factor))
    }

    fn into_map(self) -> ValueMap {
        match self {
            Value::Map(m) => m,
            scalar => {
                let mut map = ValueMap::new();
                map.insert("value".to_string(), scalar);
                map
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

// ============= Value Patterns =============

impl Pattern<Value> {
    /// Set one parameter on every hap
    pub fn set_param(self, key: &str, value: Value) -> Self {
        let key = key.to_string();
        self.fmap(move |v| v.with_param(key.clone(), value.clone()))
    }

    /// Scale the gain of every hap
    pub fn gain(self, amount: f64) -> Self {
        self.fmap(move |v| v.scale_gain(amount))
    }

    /// Gate pattern from value truthiness
    pub fn truthy(self) -> Pattern<bool> {
        self.fmap(|v| v.is_truthy())
    }
}
