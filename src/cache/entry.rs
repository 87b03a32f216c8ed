//! Cache Entry Module
//!
//! Defines the values the driver persists and the entry that wraps them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Value ==
/// A cacheable value.
///
/// `Map` is a flat keyed collection whose children are encoded one by one.
/// `Object` carries an arbitrary structured graph through the generic
/// serialization channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    Map(BTreeMap<String, Value>),
    Object(serde_json::Value),
}

impl Value {
    /// Type name written into snippet annotations.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Binary(_) => "binary",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Object(v)
    }
}

// == Cache Entry ==
/// A persisted value with its optional expiration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The stored value; `Value::Null` is a legitimate cached value
    pub value: Value,
    /// Expiration instant, None = never expires
    pub expiration: Option<DateTime<Utc>>,
}

impl CacheEntry {
    // == Constructor ==
    pub fn new(value: Value, expiration: Option<DateTime<Utc>>) -> Self {
        Self { value, expiration }
    }

    // == Is Expired At ==
    /// Checks whether the entry is expired relative to `now`.
    ///
    /// Boundary condition: an entry expiring exactly at `now` counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiration {
            Some(expires) => expires <= now,
            None => false,
        }
    }
}
