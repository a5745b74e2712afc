//! Read-only view over a host record
//!
//! Hosts deliver each field either as a bare JSON value or wrapped as
//! `{"type": "...", "value": ...}`; lookups unwrap the latter transparently.
//! Table fields are arrays of rows, each row a bare object or a host
//! subtable row `{"id": "...", "value": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON value; anything but an object yields an empty record
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Raw value of a field, unwrapped from the host field shape
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).map(unwrap_field)
    }

    /// Display text of a field; null and missing fields are empty
    pub fn text(&self, key: &str) -> String {
        match self.field(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => number_text(n),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Rows of a table field; a missing or non-array field has no rows
    pub fn rows(&self, key: &str) -> Vec<Record> {
        match self.field(key) {
            Some(Value::Array(items)) => items.iter().map(row_from_item).collect(),
            _ => Vec::new(),
        }
    }

    /// File key of the first file in an attachment field
    pub fn first_file_key(&self, key: &str) -> Option<String> {
        match self.field(key)? {
            Value::Array(files) => files
                .first()?
                .get("fileKey")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Whole-valued floats display without a trailing `.0`
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

fn unwrap_field(value: &Value) -> &Value {
    match value {
        Value::Object(map) if map.contains_key("value") => &map["value"],
        other => other,
    }
}

fn row_from_item(item: &Value) -> Record {
    match item {
        Value::Object(map) => match map.get("value") {
            Some(Value::Object(inner)) => Record {
                fields: inner.clone(),
            },
            _ => Record {
                fields: map.clone(),
            },
        },
        _ => Record::default(),
    }
}
