//! Non-fatal data integrity findings collected during a reshape pass.

use super::record::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Data problem that does not abort the reshape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIntegrityWarning {
    /// Event references a resource present in neither resource set.
    /// The event is routed to the unassigned bucket.
    UnknownResource {
        event_id: RecordId,
        resource_id: RecordId,
    },
    /// Date field is missing or cannot be parsed. The record is skipped.
    UnparseableTimestamp {
        record_id: String,
        field: String,
        value: String,
    },
    /// Shifted timestamp falls outside the representable date range.
    /// The record is skipped.
    TimestampOutOfRange { record_id: String, field: String },
}

impl Display for DataIntegrityWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownResource {
                event_id,
                resource_id,
            } => write!(
                f,
                "event {event_id} references unknown resource {resource_id}"
            ),
            Self::UnparseableTimestamp {
                record_id,
                field,
                value,
            } => write!(
                f,
                "record {record_id} has unparseable timestamp in `{field}`: `{value}`"
            ),
            Self::TimestampOutOfRange { record_id, field } => write!(
                f,
                "record {record_id} has out-of-range timestamp in `{field}`"
            ),
        }
    }
}
