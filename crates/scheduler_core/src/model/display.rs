//! Display model handed to the timeline widget.
//!
//! # Responsibility
//! - Define the immutable output snapshot of one reshape pass.
//! - Keep the widget-facing field names (`camelCase`) in one place.
//!
//! # Invariants
//! - `ResourceNode::children` is either absent or non-empty.
//! - Every node owns at least one lane; lane 0 may be empty.
//! - No two entries of one lane overlap (half-open spans).

use super::record::{FieldBag, RecordId};
use super::warning::DataIntegrityWarning;
use crate::view::window::ViewWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One event placed in a lane, with its caller-supplied projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneEntry {
    pub event_id: RecordId,
    pub visual_start_position: f64,
    pub visual_width: f64,
}

/// Horizontal sub-row of one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLane {
    pub entries: Vec<LaneEntry>,
}

impl EventLane {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn event_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.event_id.as_str())
    }
}

/// Resource row of the display tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub id: RecordId,
    pub name: String,
    #[serde(rename = "iconCls", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// `false` only when the mapping names a bookable field and it is unset.
    pub bookable: bool,
    pub expanded: bool,
    pub deep_index: usize,
    /// Record fields, including materialized relationship paths, for the
    /// widget's resource columns.
    pub fields: FieldBag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ResourceNode>>,
    #[serde(rename = "events")]
    pub lanes: Vec<EventLane>,
}

impl ResourceNode {
    /// Child nodes, empty when the node is a leaf.
    pub fn children(&self) -> &[ResourceNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Pre-order traversal of this node and its descendants.
    pub fn walk(&self) -> Vec<&ResourceNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in node.children().iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

/// Event row consumed by the widget's event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEvent {
    pub id: RecordId,
    /// Owning resource, or the first root for unassigned events.
    pub resource_id: Option<RecordId>,
    pub name: Option<String>,
    pub icon_cls: Option<String>,
    pub event_color: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub draggable: bool,
    pub resizable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cls: Option<String>,
    pub fields: FieldBag,
}

/// Normalized resource or maintenance block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRangeBlock {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: FieldBag,
}

/// Events without a visible owning resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedBucket {
    /// First root resource id; `None` when the tree is empty.
    pub resource_id: Option<RecordId>,
    pub event_ids: Vec<RecordId>,
}

/// Resource grid column descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub field: String,
    #[serde(default, alias = "label")]
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub editor: bool,
    #[serde(flatten)]
    pub extra: FieldBag,
}

impl ColumnDescriptor {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
            column_type: None,
            width: None,
            sortable: true,
            editor: true,
            extra: FieldBag::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Output snapshot of one reshape pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayModel {
    pub resources: Vec<ResourceNode>,
    pub events: Vec<DisplayEvent>,
    pub unassigned: UnassignedBucket,
    pub resource_time_ranges: Vec<TimeRangeBlock>,
    pub maintenance_time_ranges: Vec<TimeRangeBlock>,
    pub columns: Vec<ColumnDescriptor>,
    pub tooltip_fields: Vec<String>,
    pub edit_mode_fields: Vec<String>,
    pub window: ViewWindow,
    pub warnings: Vec<DataIntegrityWarning>,
}

impl DisplayModel {
    /// Finds a node anywhere in the tree.
    pub fn find_resource(&self, id: &str) -> Option<&ResourceNode> {
        fn find<'a>(nodes: &'a [ResourceNode], id: &str) -> Option<&'a ResourceNode> {
            nodes.iter().find_map(|node| {
                if node.id == id {
                    Some(node)
                } else {
                    find(node.children(), id)
                }
            })
        }
        find(&self.resources, id)
    }

    pub fn find_event(&self, id: &str) -> Option<&DisplayEvent> {
        self.events.iter().find(|event| event.id == id)
    }

    /// Node ids in pre-order.
    pub fn resource_ids(&self) -> Vec<&str> {
        self.resources
            .iter()
            .flat_map(ResourceNode::walk)
            .map(|node| node.id.as_str())
            .collect()
    }

    /// Sets the `expanded` flag of one node. Returns whether it was found.
    pub fn set_expanded(&mut self, id: &str, expanded: bool) -> bool {
        fn visit(nodes: &mut [ResourceNode], id: &str, expanded: bool) -> bool {
            for node in nodes {
                if node.id == id {
                    node.expanded = expanded;
                    return true;
                }
                if let Some(children) = node.children.as_mut() {
                    if visit(children, id, expanded) {
                        return true;
                    }
                }
            }
            false
        }
        visit(&mut self.resources, id, expanded)
    }
}
