//! Event lane packing.
//!
//! # Responsibility
//! - Partition one resource's events into rows where no two events overlap.
//! - Apply the partitioning depth-first over the resource tree.
//!
//! # Invariants
//! - First-fit: each event goes to the lowest-index lane it fits in, in
//!   input order. Output is deterministic and order-stable, not minimal.
//! - Spans are half-open; touching spans and zero-width spans at a boundary
//!   do not overlap.
//! - A resource without events still owns one empty lane.

use crate::model::display::{EventLane, LaneEntry, ResourceNode};
use crate::model::record::RecordId;
use crate::view::window::ViewWindow;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::collections::HashMap;

/// Horizontal projection of an event interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualSpan {
    pub start: f64,
    pub width: f64,
}

impl VisualSpan {
    pub fn new(start: f64, width: f64) -> Self {
        Self { start, width }
    }

    pub fn end(&self) -> f64 {
        self.start + self.width
    }

    /// Two spans overlap unless one ends at or before the other starts.
    pub fn overlaps(&self, other: &Self) -> bool {
        !(other.start >= self.end() || other.end() <= self.start)
    }
}

/// Caller-supplied projection from time to horizontal position.
pub trait VisualProjection {
    fn project(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> VisualSpan;
}

/// Linear time axis anchored at the window start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAxisProjection {
    origin: DateTime<Utc>,
    units_per_hour: f64,
}

impl TimeAxisProjection {
    pub fn new(origin: DateTime<Utc>, units_per_hour: f64) -> Self {
        Self {
            origin,
            units_per_hour,
        }
    }

    /// Axis whose origin is the window start as rendered in viewer time.
    ///
    /// Displayed instants are rendered shifted by the viewer offset, so the
    /// origin is the window start read in that offset.
    pub fn for_window(
        window: &ViewWindow,
        viewer_offset: FixedOffset,
        units_per_hour: f64,
    ) -> Self {
        let origin = viewer_offset
            .from_local_datetime(&window.start)
            .single()
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(|| window.start.and_utc());
        Self::new(origin, units_per_hour)
    }

    fn units_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
        (to - from).num_seconds() as f64 / 3600.0 * self.units_per_hour
    }
}

impl VisualProjection for TimeAxisProjection {
    fn project(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> VisualSpan {
        VisualSpan {
            start: self.units_between(self.origin, start),
            width: self.units_between(start, end).max(0.0),
        }
    }
}

/// Event ready for lane placement.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneItem {
    pub event_id: RecordId,
    pub span: VisualSpan,
}

impl LaneItem {
    pub fn new(event_id: impl Into<RecordId>, span: VisualSpan) -> Self {
        Self {
            event_id: event_id.into(),
            span,
        }
    }
}

fn entry_span(entry: &LaneEntry) -> VisualSpan {
    VisualSpan::new(entry.visual_start_position, entry.visual_width)
}

fn lane_accepts(lane: &EventLane, span: &VisualSpan) -> bool {
    lane.entries
        .iter()
        .all(|entry| !entry_span(entry).overlaps(span))
}

/// Packs events into lanes with greedy first-fit.
pub fn pack_lanes(items: &[LaneItem]) -> Vec<EventLane> {
    let mut lanes = vec![EventLane::default()];
    for item in items {
        let entry = LaneEntry {
            event_id: item.event_id.clone(),
            visual_start_position: item.span.start,
            visual_width: item.span.width,
        };
        match lanes.iter_mut().find(|lane| lane_accepts(lane, &item.span)) {
            Some(lane) => lane.entries.push(entry),
            None => lanes.push(EventLane {
                entries: vec![entry],
            }),
        }
    }
    lanes
}

/// Assigns lanes to every node, depth-first.
pub fn assign_lanes(
    nodes: &mut [ResourceNode],
    items_by_resource: &HashMap<RecordId, Vec<LaneItem>>,
) {
    for node in nodes {
        let items = items_by_resource
            .get(node.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        node.lanes = pack_lanes(items);
        if let Some(children) = node.children.as_mut() {
            assign_lanes(children, items_by_resource);
        }
    }
}
