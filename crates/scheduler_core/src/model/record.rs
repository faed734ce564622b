//! Raw backend records.
//!
//! # Responsibility
//! - Define the record shapes handed over by the backend query layer.
//! - Provide typed accessors over the mapping-addressed field bag.
//!
//! # Invariants
//! - Raw records are never mutated by the reshape pipeline; it works on
//!   owned copies.
//! - `id` is the backend record id (`Id` on the wire).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend record identifier.
pub type RecordId = String;

/// Arbitrary field bag addressed through the field mapping.
pub type FieldBag = Map<String, Value>;

/// Resource record as fetched for one query window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResource {
    /// Backend record id.
    #[serde(rename = "Id", alias = "id")]
    pub id: RecordId,
    /// Remaining record fields, including relationship objects.
    #[serde(flatten)]
    pub fields: FieldBag,
}

impl RawResource {
    /// Creates a resource with an empty field bag.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: FieldBag::new(),
        }
    }

    /// Adds one field value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the field value rendered as text, if present and non-empty.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(value_as_text)
    }
}

/// Event record as fetched for one query window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Backend record id.
    #[serde(rename = "Id", alias = "id")]
    pub id: RecordId,
    /// Remaining record fields, including relationship objects.
    #[serde(flatten)]
    pub fields: FieldBag,
}

impl RawEvent {
    /// Creates an event with an empty field bag.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: FieldBag::new(),
        }
    }

    /// Adds one field value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the field value rendered as text, if present and non-empty.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(value_as_text)
    }
}

/// Resource or maintenance time-range block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTimeRange {
    #[serde(rename = "startDate", default)]
    pub start_date: Value,
    #[serde(rename = "endDate", default)]
    pub end_date: Value,
    /// Pass-through attributes (`resourceId`, `name`, `cls`, ...).
    #[serde(flatten)]
    pub extra: FieldBag,
}

impl RawTimeRange {
    pub fn new(start_date: impl Into<Value>, end_date: impl Into<Value>) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            extra: FieldBag::new(),
        }
    }

    /// Best-effort identifier used in diagnostics.
    pub fn label(&self, index: usize) -> String {
        ["Id", "id"]
            .iter()
            .find_map(|key| self.extra.get(*key).and_then(value_as_text))
            .unwrap_or_else(|| format!("#{index}"))
    }
}

/// Renders a scalar JSON value as text.
///
/// Returns `None` for null, blank strings, arrays and objects.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Interprets a JSON value as a checkbox-style flag.
pub fn value_as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}
