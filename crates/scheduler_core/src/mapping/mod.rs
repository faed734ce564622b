//! Field mapping resolution.
//!
//! # Responsibility
//! - Normalize backend mapping keys so prefixed (`thn__`) and unprefixed
//!   spellings address the same value.
//! - Resolve the logical keys read by the reshape engine into one explicit
//!   struct, once per pass.
//! - Parse the resource order rule and the edit-mode field list.
//!
//! # Invariants
//! - Mandatory keys resolve to non-empty field names or the pass aborts with
//!   `ConfigurationError`.
//! - The order rule always has the shape `<field> <ASC|DESC>`.

pub mod path;

use crate::model::record::value_as_text;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub use path::{materialize_path, resolve_path, RecordSet, RelationshipPath};

/// Namespace prefix used by the managed package fields.
pub const KEY_PREFIX: &str = "thn__";

pub const EVENT_START_DATE_FIELD: &str = "Event_Start_Date_API_Field__c";
pub const EVENT_END_DATE_FIELD: &str = "Event_End_Date_API_Field__c";
pub const EVENT_PARENT_RESOURCE_FIELD: &str = "Event_Parent_Resource_API_Field__c";
pub const EVENT_NAME_FIELD: &str = "Event_Name_API_Field__c";
pub const EVENT_ICON_FIELD: &str = "Event_Icon_API_Field__c";
pub const EVENT_ICON_DEFAULT: &str = "Event_Icon__c";
pub const EVENT_COLOR_FIELD: &str = "Event_Color_API_Field__c";
pub const EVENT_COLOR_DEFAULT: &str = "Event_Color__c";
pub const EVENT_EDIT_MODE_FIELDS: &str = "Event_Edit_Mode_Fields__c";
pub const RESOURCE_NAME_FIELD: &str = "Resource_Name_API_Field__c";
pub const RESOURCE_ICON_FIELD: &str = "Resource_Icon_API_Field__c";
pub const RESOURCE_ICON_DEFAULT: &str = "Resource_Icon__c";
pub const RESOURCE_PARENT_FIELD: &str = "Resource_Parent_Resource_API_Field__c";
pub const RESOURCE_BOOKABLE_FIELD: &str = "Resource_Bookable_API_Field__c";
pub const RESOURCE_ORDER_RULE: &str = "Resource_Order_Rule__c";

/// Order rule applied when the mapping carries none.
pub const DEFAULT_ORDER_RULE: &str = "Name ASC";

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Fatal mapping problem. Indicates misconfiguration, not bad data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Mandatory logical key is absent or blank.
    MissingKey(&'static str),
    /// Key is present but its value is not a field name.
    InvalidValue { key: &'static str, value: String },
    /// Order rule is not `<field> <ASC|DESC>`.
    MalformedOrderRule(String),
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingKey(key) => write!(f, "field mapping is missing `{key}`"),
            Self::InvalidValue { key, value } => {
                write!(f, "field mapping `{key}` has invalid value `{value}`")
            }
            Self::MalformedOrderRule(rule) => write!(
                f,
                "resource order rule `{rule}` must look like `<field> <ASC|DESC>`"
            ),
        }
    }
}

impl Error for ConfigurationError {}

/// Returns the canonical (prefixed) spelling of a mapping key.
pub fn canonical_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.starts_with(KEY_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{KEY_PREFIX}{trimmed}")
    }
}

/// Backend mapping with dual-key normalization applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMapping {
    entries: IndexMap<String, Value>,
}

impl FieldMapping {
    /// Builds a mapping from the raw backend object.
    ///
    /// When both spellings of one key are present the unprefixed value wins.
    pub fn from_raw(raw: &IndexMap<String, Value>) -> Self {
        let mut entries = IndexMap::with_capacity(raw.len());
        for (key, value) in raw {
            let canonical = canonical_key(key);
            if key.trim().starts_with(KEY_PREFIX) {
                entries.entry(canonical).or_insert_with(|| value.clone());
            } else {
                entries.insert(canonical, value.clone());
            }
        }
        Self { entries }
    }

    /// Looks a key up by either spelling.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(canonical_key(key).as_str())
    }

    /// Looks a key up and renders it as non-empty text.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_as_text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Relationship paths that must be materialized on events or resources.
    pub fn relationship_paths(&self) -> Vec<RelationshipPath> {
        let mut paths: Vec<RelationshipPath> = Vec::new();
        for (key, value) in &self.entries {
            let Some(set) = RecordSet::for_mapping_key(key) else {
                continue;
            };
            let Value::String(path) = value else {
                continue;
            };
            if !path::is_relationship_path(path) {
                continue;
            }
            let candidate = RelationshipPath {
                set,
                path: path.trim().to_string(),
            };
            if !paths.contains(&candidate) {
                paths.push(candidate);
            }
        }
        paths
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigurationError> {
        match self.get(key) {
            None | Some(Value::Null) => Err(ConfigurationError::MissingKey(key)),
            Some(Value::String(text)) if text.trim().is_empty() => {
                Err(ConfigurationError::MissingKey(key))
            }
            Some(Value::String(text)) => Ok(text.trim().to_string()),
            Some(other) => Err(ConfigurationError::InvalidValue {
                key,
                value: other.to_string(),
            }),
        }
    }
}

/// Sort direction of the order rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Parsed `<field> <ASC|DESC>` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRule {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderRule {
    /// Parses a rule after collapsing whitespace runs to single spaces.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
        let mut parts = collapsed.split(' ');
        let (Some(field), Some(direction), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ConfigurationError::MalformedOrderRule(raw.to_string()));
        };
        if field.is_empty() {
            return Err(ConfigurationError::MalformedOrderRule(raw.to_string()));
        }
        let direction = if direction.eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else if direction.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            return Err(ConfigurationError::MalformedOrderRule(raw.to_string()));
        };
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }

    pub fn is_descending(&self) -> bool {
        self.direction == SortDirection::Desc
    }
}

impl Default for OrderRule {
    fn default() -> Self {
        Self {
            field: "Name".to_string(),
            direction: SortDirection::Asc,
        }
    }
}

impl FromStr for OrderRule {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Display for OrderRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let direction = match self.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        write!(f, "{} {direction}", self.field)
    }
}

/// Explicit view of every mapping key the reshape engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMapping {
    pub event_start_field: String,
    pub event_end_field: String,
    pub event_parent_resource_field: String,
    pub event_name_field: Option<String>,
    pub event_icon_field: Option<String>,
    pub event_icon_default: Option<String>,
    pub event_color_field: Option<String>,
    pub event_color_default: Option<String>,
    pub resource_name_field: String,
    pub resource_icon_field: Option<String>,
    pub resource_icon_default: Option<String>,
    pub resource_parent_field: Option<String>,
    pub resource_bookable_field: Option<String>,
    pub order_rule: OrderRule,
    pub edit_mode_fields: Vec<String>,
}

impl ResolvedMapping {
    /// Resolves all logical keys, failing on the first missing mandatory key.
    pub fn resolve(mapping: &FieldMapping) -> Result<Self, ConfigurationError> {
        let order_rule = match mapping.text(RESOURCE_ORDER_RULE) {
            Some(rule) => OrderRule::parse(&rule)?,
            None => OrderRule::default(),
        };

        Ok(Self {
            event_start_field: mapping.required(EVENT_START_DATE_FIELD)?,
            event_end_field: mapping.required(EVENT_END_DATE_FIELD)?,
            event_parent_resource_field: mapping.required(EVENT_PARENT_RESOURCE_FIELD)?,
            event_name_field: mapping.text(EVENT_NAME_FIELD),
            event_icon_field: mapping.text(EVENT_ICON_FIELD),
            event_icon_default: mapping.text(EVENT_ICON_DEFAULT),
            event_color_field: mapping.text(EVENT_COLOR_FIELD),
            event_color_default: mapping.text(EVENT_COLOR_DEFAULT),
            resource_name_field: mapping.required(RESOURCE_NAME_FIELD)?,
            resource_icon_field: mapping.text(RESOURCE_ICON_FIELD),
            resource_icon_default: mapping.text(RESOURCE_ICON_DEFAULT),
            resource_parent_field: mapping.text(RESOURCE_PARENT_FIELD),
            resource_bookable_field: mapping.text(RESOURCE_BOOKABLE_FIELD),
            order_rule,
            edit_mode_fields: split_field_list(
                mapping.text(EVENT_EDIT_MODE_FIELDS).as_deref().unwrap_or(""),
            ),
        })
    }
}

/// Splits a comma-separated field list, trimming and dropping blanks.
pub fn split_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}
