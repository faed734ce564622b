//! One reshape pass: backend payload in, display model out.
//!
//! # Responsibility
//! - Resolve the mapping once and thread it through every stage.
//! - Work on owned copies of the payload records; inputs stay untouched.
//! - Collect data integrity warnings instead of failing the pass.
//!
//! # Invariants
//! - Only configuration problems abort a pass.
//! - The timezone shift is applied exactly once per record.
//! - Output is a pure function of payload and context.
//!
//! # See also
//! - `reshape::tree`, `reshape::lanes`, `reshape::timezone`

use super::columns::resolve_columns;
use super::lanes::{assign_lanes, LaneItem, VisualProjection};
use super::timezone::{normalize_field, normalize_time_range, TimezoneShift};
use super::tree::{build_resource_tree, ResourceCatalog};
use crate::mapping::{
    materialize_path, ConfigurationError, FieldMapping, RecordSet, ResolvedMapping,
};
use crate::model::display::{DisplayEvent, DisplayModel, TimeRangeBlock, UnassignedBucket};
use crate::model::payload::SchedulerPayload;
use crate::model::preferences::ViewPreferences;
use crate::model::record::{RawEvent, RawTimeRange, RecordId};
use crate::model::warning::DataIntegrityWarning;
use crate::view::window::ViewWindow;
use chrono::{DateTime, FixedOffset, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Style class of events shown on the first root for lack of an owner.
pub const UNASSIGNED_EVENT_CLS: &str = "event-column";

/// Largest source offset accepted, in hours.
const MAX_OFFSET_HOURS: f64 = 18.0;

pub type ReshapeResult<T> = Result<T, ReshapeError>;

/// Fatal reshape failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ReshapeError {
    Configuration(ConfigurationError),
    /// Source timezone offset is not a finite value within +/- 18 hours.
    InvalidTimezoneOffset(f64),
}

impl Display for ReshapeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "{err}"),
            Self::InvalidTimezoneOffset(hours) => {
                write!(f, "timezone offset {hours}h is out of range")
            }
        }
    }
}

impl Error for ReshapeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::InvalidTimezoneOffset(_) => None,
        }
    }
}

impl From<ConfigurationError> for ReshapeError {
    fn from(value: ConfigurationError) -> Self {
        Self::Configuration(value)
    }
}

/// Caller-owned inputs of one pass besides the payload.
pub struct ReshapeContext<'a> {
    pub viewer_offset: FixedOffset,
    pub window: ViewWindow,
    pub projection: &'a dyn VisualProjection,
    pub preferences: &'a ViewPreferences,
}

enum Owner {
    Resource(RecordId),
    Unassigned,
}

struct PlacedEvent {
    event: DisplayEvent,
    owner: Owner,
}

/// Runs one reshape pass.
///
/// # Errors
/// - Returns `ReshapeError::Configuration` when a mandatory mapping key is
///   missing or the order rule is malformed.
/// - Returns `ReshapeError::InvalidTimezoneOffset` for an unusable offset.
pub fn reshape(
    payload: &SchedulerPayload,
    context: &ReshapeContext<'_>,
) -> ReshapeResult<DisplayModel> {
    let started_at = Instant::now();
    match reshape_inner(payload, context) {
        Ok(model) => {
            info!(
                "event=reshape module=reshape status=ok resources={} events={} unassigned={} warnings={} duration_ms={}",
                model.resource_ids().len(),
                model.events.len(),
                model.unassigned.event_ids.len(),
                model.warnings.len(),
                started_at.elapsed().as_millis()
            );
            Ok(model)
        }
        Err(err) => {
            error!(
                "event=reshape module=reshape status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn reshape_inner(
    payload: &SchedulerPayload,
    context: &ReshapeContext<'_>,
) -> ReshapeResult<DisplayModel> {
    let field_mapping = FieldMapping::from_raw(&payload.mapping);
    let mapping = ResolvedMapping::resolve(&field_mapping)?;
    let hours = payload.timezone_offset;
    if !hours.is_finite() || hours.abs() > MAX_OFFSET_HOURS {
        return Err(ReshapeError::InvalidTimezoneOffset(hours));
    }
    let shift = TimezoneShift::new(hours, context.viewer_offset);

    let paths = field_mapping.relationship_paths();
    let mut catalog = ResourceCatalog::from_sets(&payload.resources, &payload.all_resources);
    for path in paths.iter().filter(|p| p.set == RecordSet::Resource) {
        for record in catalog.records_mut() {
            materialize_path(&mut record.fields, &path.path);
        }
    }
    let event_paths: Vec<&str> = paths
        .iter()
        .filter(|p| p.set == RecordSet::Event)
        .map(|p| p.path.as_str())
        .collect();

    debug!(
        "event=reshape module=reshape status=start resources={} visible={} events={} shift_seconds={}",
        catalog.len(),
        catalog.visible_count(),
        payload.events.len(),
        shift.seconds()
    );

    let mut warnings: Vec<DataIntegrityWarning> = Vec::new();
    let mut placed: Vec<PlacedEvent> = Vec::with_capacity(payload.events.len());
    for raw in &payload.events {
        match place_event(raw, &event_paths, &mapping, &catalog, shift) {
            Ok((event, warning)) => {
                if let Some(warning) = warning {
                    record_warning(&mut warnings, warning);
                }
                placed.push(event);
            }
            Err(warning) => record_warning(&mut warnings, warning),
        }
    }

    let mut resources = build_resource_tree(
        &catalog,
        &mapping,
        &context.preferences.collapsed_resource_ids,
    );
    let first_root = resources.first().map(|node| node.id.clone());

    let mut unassigned = UnassignedBucket {
        resource_id: first_root.clone(),
        event_ids: Vec::new(),
    };
    let mut items_by_resource: HashMap<RecordId, Vec<LaneItem>> = HashMap::new();
    let mut events: Vec<DisplayEvent> = Vec::with_capacity(placed.len());
    for PlacedEvent { mut event, owner } in placed {
        let row = match owner {
            Owner::Resource(id) => Some(id),
            Owner::Unassigned => {
                unassigned.event_ids.push(event.id.clone());
                event.cls = Some(UNASSIGNED_EVENT_CLS.to_string());
                first_root.clone()
            }
        };
        if let Some(row) = row.as_ref() {
            let span = context.projection.project(event.start_date, event.end_date);
            items_by_resource
                .entry(row.clone())
                .or_default()
                .push(LaneItem::new(event.id.clone(), span));
        }
        event.resource_id = row;
        events.push(event);
    }
    assign_lanes(&mut resources, &items_by_resource);

    let resource_time_ranges =
        normalize_time_ranges(&payload.resource_time_ranges, shift, &mut warnings);
    let maintenance_time_ranges =
        normalize_time_ranges(&payload.maintenance_time_ranges, shift, &mut warnings);

    Ok(DisplayModel {
        resources,
        events,
        unassigned,
        resource_time_ranges,
        maintenance_time_ranges,
        columns: resolve_columns(&payload.resource_columns, &context.preferences.column_widths),
        tooltip_fields: payload.event_tooltip_fields.clone(),
        edit_mode_fields: mapping.edit_mode_fields.clone(),
        window: context.window,
        warnings,
    })
}

/// Normalizes one event and decides which row owns it.
///
/// `Err` means the event is skipped; the second tuple member carries a
/// warning for events that are kept.
fn place_event(
    raw: &RawEvent,
    event_paths: &[&str],
    mapping: &ResolvedMapping,
    catalog: &ResourceCatalog,
    shift: TimezoneShift,
) -> Result<(PlacedEvent, Option<DataIntegrityWarning>), DataIntegrityWarning> {
    let mut record = raw.clone();
    for path in event_paths {
        materialize_path(&mut record.fields, path);
    }

    let start_date = normalize_event_date(&record, &mapping.event_start_field, shift)?;
    let end_date = normalize_event_date(&record, &mapping.event_end_field, shift)?;

    let mut warning = None;
    let owner = match record.text(&mapping.event_parent_resource_field) {
        Some(resource_id) if catalog.is_visible(&resource_id) => Owner::Resource(resource_id),
        Some(resource_id) if catalog.contains(&resource_id) => {
            debug!(
                "event=event_route module=reshape status=hidden_owner event_id={} resource_id={}",
                record.id, resource_id
            );
            Owner::Unassigned
        }
        Some(resource_id) => {
            warning = Some(DataIntegrityWarning::UnknownResource {
                event_id: record.id.clone(),
                resource_id,
            });
            Owner::Unassigned
        }
        None => Owner::Unassigned,
    };

    let event = DisplayEvent {
        id: record.id.clone(),
        resource_id: None,
        name: optional_text(&record, mapping.event_name_field.as_deref()),
        icon_cls: optional_text(&record, mapping.event_icon_field.as_deref())
            .or_else(|| mapping.event_icon_default.clone()),
        event_color: optional_text(&record, mapping.event_color_field.as_deref())
            .or_else(|| mapping.event_color_default.clone()),
        start_date,
        end_date,
        draggable: true,
        resizable: true,
        cls: None,
        fields: record.fields,
    };
    Ok((PlacedEvent { event, owner }, warning))
}

fn normalize_event_date(
    record: &RawEvent,
    field: &str,
    shift: TimezoneShift,
) -> Result<DateTime<Utc>, DataIntegrityWarning> {
    normalize_field(&record.id, field, record.fields.get(field), shift)
}

fn optional_text(record: &RawEvent, field: Option<&str>) -> Option<String> {
    field.and_then(|field| record.text(field))
}

fn normalize_time_ranges(
    ranges: &[RawTimeRange],
    shift: TimezoneShift,
    warnings: &mut Vec<DataIntegrityWarning>,
) -> Vec<TimeRangeBlock> {
    ranges
        .iter()
        .enumerate()
        .filter_map(|(index, range)| {
            normalize_time_range(range, index, shift)
                .map_err(|warning| record_warning(warnings, warning))
                .ok()
        })
        .collect()
}

fn record_warning(warnings: &mut Vec<DataIntegrityWarning>, warning: DataIntegrityWarning) {
    warn!(
        "event=data_integrity module=reshape status=warning detail={}",
        warning
    );
    warnings.push(warning);
}
