//! Loosely typed broker records.
//!
//! A master file is a JSON object mapping an arbitrary key (usually the broker
//! token) to a record, or a plain array of records. Field types drift between files: numbers arrive as
//! strings, dates as Unix timestamps or `"None"`, flags as `0`/`1`. A
//! [`RawRecord`] only hands fields out as [`RawValue`]s; typed values come out
//! through [`crate::normalize`] and nowhere else.

use serde_json::{Map, Number, Value};

/// One field of a raw record, before normalization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawValue<'a> {
    /// Key missing or JSON `null`.
    Absent,
    Text(&'a str),
    Number(&'a Number),
    Bool(bool),
    /// Arrays and objects. No catalog field expects one.
    Unsupported,
}

impl<'a> From<Option<&'a Value>> for RawValue<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => RawValue::Absent,
            Some(Value::String(s)) => RawValue::Text(s),
            Some(Value::Number(n)) => RawValue::Number(n),
            Some(Value::Bool(b)) => RawValue::Bool(*b),
            Some(Value::Array(_)) | Some(Value::Object(_)) => RawValue::Unsupported,
        }
    }
}

/// A single instrument record as it appeared in a master file.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    key: String,
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Wraps a JSON value found under `key`. Non-object values become a record
    /// with no fields, which fails normalization instead of being dropped silently.
    pub fn from_json(key: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Key the record was stored under in its file.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self, name: &str) -> RawValue<'_> {
        RawValue::from(self.fields.get(name))
    }

    /// First field among `names` that is present and not an empty string.
    pub fn first_present(&self, names: &[&str]) -> RawValue<'_> {
        names
            .iter()
            .map(|name| self.get(name))
            .find(|value| match value {
                RawValue::Absent => false,
                RawValue::Text(s) => !s.trim().is_empty(),
                _ => true,
            })
            .unwrap_or(RawValue::Absent)
    }

    /// Best human-readable identifier for log lines: ticker, then broker token, then file key.
    pub fn label(&self) -> String {
        match self.first_present(&["symTicker", "fyToken"]) {
            RawValue::Text(s) => s.to_string(),
            RawValue::Number(n) => n.to_string(),
            _ => self.key.clone(),
        }
    }
}

/// Why a master file could not be turned into records.
#[derive(Debug, thiserror::Error)]
pub enum MasterFileError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("root is neither a JSON object nor an array")]
    NotACollection,
}

/// Parses the contents of one master file into its records, in file order.
/// Array elements are keyed by their index.
pub fn parse_master_file(text: &str) -> Result<Vec<RawRecord>, MasterFileError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| RawRecord::from_json(key, value))
            .collect()),
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, value)| RawRecord::from_json(i.to_string(), value))
            .collect()),
        _ => Err(MasterFileError::NotACollection),
    }
}
