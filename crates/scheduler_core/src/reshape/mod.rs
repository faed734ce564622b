//! Reshape engine: flat backend records to the widget display model.
//!
//! # Responsibility
//! - Rebuild the resource tree from parent pointers.
//! - Normalize dates between source and viewer timezones.
//! - Pack each resource's events into overlap-free lanes.
//!
//! # Invariants
//! - A pass never mutates its input payload.
//! - Data problems become warnings; only configuration problems fail a pass.

pub mod columns;
pub mod lanes;
pub mod pipeline;
pub mod timezone;
pub mod tree;

pub use columns::{resolve_columns, usable_width};
pub use lanes::{
    assign_lanes, pack_lanes, LaneItem, TimeAxisProjection, VisualProjection, VisualSpan,
};
pub use pipeline::{reshape, ReshapeContext, ReshapeError, ReshapeResult, UNASSIGNED_EVENT_CLS};
pub use timezone::{format_for_save, parse_timestamp, TimezoneShift};
pub use tree::{build_resource_tree, ResourceCatalog};
