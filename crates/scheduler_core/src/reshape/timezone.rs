//! Timestamp parsing and source/viewer timezone normalization.
//!
//! # Responsibility
//! - Parse stored timestamps in the shapes the backend emits.
//! - Shift stored instants so the widget, which renders in viewer-local
//!   time, shows the source-timezone wall clock.
//!
//! # Invariants
//! - `displayed = stored + source_offset - viewer_offset`, where offsets are
//!   east-positive. Equivalently, source offset plus the viewer's
//!   minutes-west offset converted to hours.
//! - The shift is not idempotent; it is applied exactly once to freshly
//!   copied records per pass.

use crate::model::display::TimeRangeBlock;
use crate::model::record::{value_as_text, RawTimeRange};
use crate::model::warning::DataIntegrityWarning;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

const SAVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Fixed shift between stored instants and displayed instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneShift {
    seconds: i64,
}

impl TimezoneShift {
    /// Builds the shift from the source offset (hours, may be fractional) and
    /// the viewer's local offset.
    pub fn new(source_offset_hours: f64, viewer_offset: FixedOffset) -> Self {
        let source_seconds = (source_offset_hours * 3600.0).round() as i64;
        Self {
            seconds: source_seconds - i64::from(viewer_offset.local_minus_utc()),
        }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Stored instant -> displayed instant. `None` past the representable range.
    pub fn apply(&self, stored: DateTime<Utc>) -> Option<DateTime<Utc>> {
        stored.checked_add_signed(Duration::seconds(self.seconds))
    }

    /// Displayed instant -> stored instant. `None` past the representable range.
    pub fn revert(&self, displayed: DateTime<Utc>) -> Option<DateTime<Utc>> {
        displayed.checked_sub_signed(Duration::seconds(self.seconds))
    }
}

/// Parses one stored timestamp.
///
/// Accepts epoch milliseconds, RFC 3339, `+hhmm` offsets and offset-less
/// date-times or dates (read as UTC).
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::String(text) => parse_timestamp_text(text.trim()),
        _ => None,
    }
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Formats a stored instant the way the save endpoint expects it.
pub fn format_for_save(stored: DateTime<Utc>) -> String {
    stored.format(SAVE_FORMAT).to_string()
}

/// Parses and shifts one record timestamp, reporting failures as warnings.
pub fn normalize_field(
    record_id: &str,
    field: &str,
    value: Option<&Value>,
    shift: TimezoneShift,
) -> Result<DateTime<Utc>, DataIntegrityWarning> {
    let stored = value.and_then(parse_timestamp).ok_or_else(|| {
        DataIntegrityWarning::UnparseableTimestamp {
            record_id: record_id.to_string(),
            field: field.to_string(),
            value: value
                .map(|raw| value_as_text(raw).unwrap_or_else(|| raw.to_string()))
                .unwrap_or_default(),
        }
    })?;
    shift
        .apply(stored)
        .ok_or_else(|| DataIntegrityWarning::TimestampOutOfRange {
            record_id: record_id.to_string(),
            field: field.to_string(),
        })
}

/// Normalizes a resource or maintenance time-range block.
pub fn normalize_time_range(
    range: &RawTimeRange,
    index: usize,
    shift: TimezoneShift,
) -> Result<TimeRangeBlock, DataIntegrityWarning> {
    let label = range.label(index);
    let start_date = normalize_field(&label, "startDate", Some(&range.start_date), shift)?;
    let end_date = normalize_field(&label, "endDate", Some(&range.end_date), shift)?;
    Ok(TimeRangeBlock {
        start_date,
        end_date,
        extra: range.extra.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offset_hours(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).expect("valid offset")
    }

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text)
            .expect("valid fixture")
            .with_timezone(&Utc)
    }

    #[test]
    fn parses_backend_timestamp_shapes() {
        let expected = at("2024-01-05T10:00:00Z");
        for raw in [
            json!("2024-01-05T10:00:00.000Z"),
            json!("2024-01-05T10:00:00.000+0000"),
            json!("2024-01-05T12:00:00+02:00"),
            json!("2024-01-05 10:00:00"),
            json!("2024-01-05T10:00"),
            json!(1_704_448_800_000_i64),
        ] {
            assert_eq!(parse_timestamp(&raw), Some(expected), "input {raw}");
        }
        assert_eq!(
            parse_timestamp(&json!("2024-01-05")),
            Some(at("2024-01-05T00:00:00Z"))
        );
    }

    #[test]
    fn rejects_garbage_and_non_scalar_values() {
        assert_eq!(parse_timestamp(&json!("tomorrow")), None);
        assert_eq!(parse_timestamp(&json!("")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
        assert_eq!(parse_timestamp(&json!({"d": 1})), None);
    }

    #[test]
    fn shift_adds_source_and_subtracts_viewer_offset() {
        let shift = TimezoneShift::new(3.0, offset_hours(1));
        assert_eq!(shift.seconds(), 2 * 3600);
        assert_eq!(
            shift.apply(at("2024-01-05T10:00:00Z")),
            Some(at("2024-01-05T12:00:00Z"))
        );
    }

    #[test]
    fn shift_handles_fractional_source_offset() {
        let shift = TimezoneShift::new(5.5, offset_hours(0));
        assert_eq!(shift.seconds(), 5 * 3600 + 1800);
    }

    #[test]
    fn revert_inverts_apply() {
        let shift = TimezoneShift::new(-4.0, offset_hours(2));
        let stored = at("2024-07-01T08:15:00Z");
        assert_eq!(shift.apply(stored).and_then(|d| shift.revert(d)), Some(stored));
    }

    #[test]
    fn applying_twice_is_not_idempotent() {
        let shift = TimezoneShift::new(1.0, offset_hours(0));
        let stored = at("2024-07-01T08:00:00Z");
        let once = shift.apply(stored);
        assert_ne!(once.and_then(|d| shift.apply(d)), once);
    }

    #[test]
    fn time_range_failure_reports_label_and_field() {
        let mut range = RawTimeRange::new("2024-01-01T00:00:00Z", "soon");
        range.extra.insert("Id".to_string(), json!("m1"));
        let warning = normalize_time_range(&range, 0, TimezoneShift::new(0.0, offset_hours(0)))
            .unwrap_err();
        assert_eq!(
            warning,
            DataIntegrityWarning::UnparseableTimestamp {
                record_id: "m1".to_string(),
                field: "endDate".to_string(),
                value: "soon".to_string(),
            }
        );
    }

    #[test]
    fn shift_past_representable_range_is_reported() {
        let shift = TimezoneShift::new(5.0, offset_hours(0));
        let raw = json!(8_210_266_876_799_999_i64);
        assert!(parse_timestamp(&raw).is_some());
        assert_eq!(
            normalize_field("e1", "Start__c", Some(&raw), shift),
            Err(DataIntegrityWarning::TimestampOutOfRange {
                record_id: "e1".to_string(),
                field: "Start__c".to_string(),
            })
        );
        assert_eq!(shift.revert(DateTime::<Utc>::MIN_UTC), None);
    }

    #[test]
    fn format_for_save_uses_space_separator() {
        assert_eq!(
            format_for_save(at("2024-01-05T10:30:00Z")),
            "2024-01-05 10:30:00"
        );
    }
}
