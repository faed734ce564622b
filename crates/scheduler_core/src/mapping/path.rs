//! Dotted relationship path walking.
//!
//! Mapping values such as `Booking__r.Guest__r.Name` address fields on
//! related records nested inside a record's field bag. They are resolved once
//! per pass and materialized under a flat field named by the full path.

use crate::model::record::FieldBag;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker separating a relationship name from the next path segment.
const RELATIONSHIP_MARKER: &str = "__r.";

/// Record set a mapping key applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordSet {
    Event,
    Resource,
}

impl RecordSet {
    /// Classifies a canonical mapping key by its name prefix.
    pub fn for_mapping_key(key: &str) -> Option<Self> {
        let lowered = key.to_ascii_lowercase();
        if lowered.starts_with("thn__event") {
            Some(Self::Event)
        } else if lowered.starts_with("thn__resource") {
            Some(Self::Resource)
        } else {
            None
        }
    }
}

/// Relationship path to materialize on one record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipPath {
    pub set: RecordSet,
    pub path: String,
}

/// Whether a mapping value walks through at least one relationship.
pub fn is_relationship_path(value: &str) -> bool {
    value.to_ascii_lowercase().contains(RELATIONSHIP_MARKER)
}

/// Walks a dotted path through nested objects.
///
/// Returns `None` as soon as a segment is missing or a non-object value is
/// reached before the last segment.
pub fn resolve_path<'a>(fields: &'a FieldBag, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Stores the resolved path value under the flat `path` key.
///
/// Unresolvable paths are stored as `null` so later lookups stay flat.
pub fn materialize_path(fields: &mut FieldBag, path: &str) {
    let resolved = resolve_path(fields, path).cloned().unwrap_or(Value::Null);
    fields.insert(path.to_string(), resolved);
}

#[cfg(test)]
mod tests {
    use super::{is_relationship_path, materialize_path, resolve_path, RecordSet};
    use crate::model::record::FieldBag;
    use serde_json::{json, Value};

    fn bag(value: Value) -> FieldBag {
        value.as_object().cloned().expect("fixture must be an object")
    }

    #[test]
    fn resolves_nested_relationship_values() {
        let fields = bag(json!({
            "Booking__r": {"Guest__r": {"Name": "Ada"}}
        }));
        assert_eq!(
            resolve_path(&fields, "Booking__r.Guest__r.Name"),
            Some(&json!("Ada"))
        );
        assert_eq!(resolve_path(&fields, "Booking__r.Missing__r.Name"), None);
    }

    #[test]
    fn stops_at_null_relationship() {
        let fields = bag(json!({"Booking__r": null}));
        assert_eq!(resolve_path(&fields, "Booking__r.Name"), None);
    }

    #[test]
    fn materialize_writes_flat_field_including_misses() {
        let mut fields = bag(json!({"Type__r": {"Icon__c": "bed"}}));
        materialize_path(&mut fields, "Type__r.Icon__c");
        materialize_path(&mut fields, "Owner__r.Name");

        assert_eq!(fields.get("Type__r.Icon__c"), Some(&json!("bed")));
        assert_eq!(fields.get("Owner__r.Name"), Some(&Value::Null));
    }

    #[test]
    fn detects_marker_case_insensitively() {
        assert!(is_relationship_path("Parent__R.Name"));
        assert!(!is_relationship_path("Name"));
        assert!(!is_relationship_path("Owner.Name"));
    }

    #[test]
    fn classifies_mapping_keys() {
        assert_eq!(
            RecordSet::for_mapping_key("thn__Event_Name_API_Field__c"),
            Some(RecordSet::Event)
        );
        assert_eq!(
            RecordSet::for_mapping_key("thn__Resource_Icon_API_Field__c"),
            Some(RecordSet::Resource)
        );
        assert_eq!(RecordSet::for_mapping_key("thn__Other__c"), None);
    }
}
