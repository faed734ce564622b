//! Backend payload envelope for one fetch cycle.

use super::display::ColumnDescriptor;
use super::record::{RawEvent, RawResource, RawTimeRange, RecordId};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Everything the backend returns for one query window.
///
/// Keyed record sets keep backend key order; resource sorting is stable and
/// relies on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerPayload {
    /// Logical field key -> API field name or relationship path.
    #[serde(default)]
    pub mapping: IndexMap<String, Value>,
    /// Resources matching the active filters (visible set).
    #[serde(default)]
    pub resources: IndexMap<RecordId, RawResource>,
    /// Superset including ancestors used only for parent-chain walking.
    #[serde(default)]
    pub all_resources: Vec<RawResource>,
    /// Events, sent either keyed by id or as a list.
    #[serde(default, deserialize_with = "records_from_map_or_list")]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub resource_time_ranges: Vec<RawTimeRange>,
    #[serde(default)]
    pub maintenance_time_ranges: Vec<RawTimeRange>,
    #[serde(default, alias = "resourceDisplayColumns")]
    pub resource_columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub event_tooltip_fields: Vec<String>,
    /// Source-data timezone relative to UTC, in hours.
    #[serde(default)]
    pub timezone_offset: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapOrList<T> {
    Map(IndexMap<String, T>),
    List(Vec<T>),
}

fn records_from_map_or_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match MapOrList::<T>::deserialize(deserializer)? {
        MapOrList::Map(records) => records.into_values().collect(),
        MapOrList::List(records) => records,
    })
}
