//! Resource tree reconstruction from parent pointers.
//!
//! # Responsibility
//! - Merge the visible resource set with the ancestor superset.
//! - Re-parent visible resources onto their nearest visible ancestor.
//! - Sort roots and sibling lists by the resolved order rule.
//!
//! # Invariants
//! - Only visible resources are emitted; invisible ones are stepping stones.
//! - Every emitted node is reachable from exactly one root.
//! - Chain walks terminate: each walk keeps its own visited set and any
//!   cycle promotes the walking resource to root.
//! - Sorting is stable; equal keys keep catalog order.

use crate::mapping::{OrderRule, ResolvedMapping};
use crate::model::display::ResourceNode;
use crate::model::record::{value_as_flag, value_as_text, RawResource, RecordId};
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

/// One resource with its derived visibility.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub record: RawResource,
    pub visible: bool,
}

/// Arena of all resources known to one pass, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceCatalog {
    entries: IndexMap<RecordId, CatalogEntry>,
}

impl ResourceCatalog {
    /// Builds the catalog from the visible set and the ancestor superset.
    ///
    /// Visible resources keep their order; superset-only resources follow in
    /// superset order, marked invisible.
    pub fn from_sets(visible: &IndexMap<RecordId, RawResource>, all: &[RawResource]) -> Self {
        let mut entries: IndexMap<RecordId, CatalogEntry> = visible
            .iter()
            .map(|(id, record)| {
                (
                    id.clone(),
                    CatalogEntry {
                        record: record.clone(),
                        visible: true,
                    },
                )
            })
            .collect();
        for record in all {
            entries
                .entry(record.id.clone())
                .or_insert_with(|| CatalogEntry {
                    record: record.clone(),
                    visible: false,
                });
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(|entry| entry.visible)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.visible).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Mutable access to the owned record copies, used for path
    /// materialization before the tree is built.
    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut RawResource> {
        self.entries.values_mut().map(|entry| &mut entry.record)
    }

    fn parent_of(&self, id: &str, parent_field: &str) -> Option<RecordId> {
        self.entries
            .get(id)
            .and_then(|entry| entry.record.fields.get(parent_field))
            .and_then(value_as_text)
    }

    /// Resolves the visible attachment target of every visible resource.
    ///
    /// `None` marks a root.
    pub fn resolve_attachments(
        &self,
        parent_field: Option<&str>,
    ) -> IndexMap<RecordId, Option<RecordId>> {
        let mut shortcuts: HashMap<RecordId, Option<RecordId>> = HashMap::new();
        let mut attachments: IndexMap<RecordId, Option<RecordId>> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.visible)
            .map(|(id, _)| {
                let target = parent_field
                    .and_then(|field| self.visible_ancestor(id, field, &mut shortcuts));
                (id.clone(), target)
            })
            .collect();
        break_attachment_cycles(&mut attachments);
        attachments
    }

    /// Walks up from `id` to its nearest visible ancestor.
    ///
    /// Invisible intermediates are memoized in `shortcuts` so deeper
    /// resources skip them.
    fn visible_ancestor(
        &self,
        id: &str,
        parent_field: &str,
        shortcuts: &mut HashMap<RecordId, Option<RecordId>>,
    ) -> Option<RecordId> {
        let mut cursor = self.parent_of(id, parent_field)?;
        let mut visited: HashSet<RecordId> = HashSet::from([id.to_string()]);
        let mut walked: Vec<RecordId> = Vec::new();

        let target = loop {
            if let Some(shortcut) = shortcuts.get(&cursor) {
                break shortcut.clone();
            }
            if !visited.insert(cursor.clone()) {
                warn!(
                    "event=resource_tree module=reshape status=cycle resource_id={} at={}",
                    id, cursor
                );
                return None;
            }
            let Some(entry) = self.entries.get(&cursor) else {
                debug!(
                    "event=resource_tree module=reshape status=broken_chain resource_id={} missing={}",
                    id, cursor
                );
                break None;
            };
            if entry.visible {
                break Some(cursor);
            }
            walked.push(cursor.clone());
            match self.parent_of(&cursor, parent_field) {
                Some(next) => cursor = next,
                None => break None,
            }
        };

        if target.as_deref() == Some(id) {
            return None;
        }
        for intermediate in walked {
            shortcuts.insert(intermediate, target.clone());
        }
        target
    }
}

/// Promotes one member of every attachment cycle among visible resources.
///
/// Resources are processed in catalog order; the first member reached is
/// the one promoted.
fn break_attachment_cycles(attachments: &mut IndexMap<RecordId, Option<RecordId>>) {
    let ids: Vec<RecordId> = attachments.keys().cloned().collect();
    for id in ids {
        let mut seen: HashSet<RecordId> = HashSet::from([id.clone()]);
        let mut cursor = attachments.get(&id).cloned().flatten();
        while let Some(current) = cursor {
            if current == id {
                warn!(
                    "event=resource_tree module=reshape status=cycle resource_id={} promoted=root",
                    id
                );
                attachments.insert(id.clone(), None);
                break;
            }
            if !seen.insert(current.clone()) {
                break;
            }
            cursor = attachments.get(&current).cloned().flatten();
        }
    }
}

/// Comparable form of an order-rule field value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Text(String),
    Number(f64),
    Missing,
}

impl SortKey {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text.to_lowercase()),
            Value::Number(number) => number.as_f64().map_or(Self::Missing, Self::Number),
            Value::Bool(flag) => Self::Number(if *flag { 1.0 } else { 0.0 }),
            Value::Null | Value::Array(_) | Value::Object(_) => Self::Missing,
        }
    }

    /// Total ordering: numbers before text, numbers by value, text
    /// lexicographically. Missing values rank as the number `0`, which also
    /// places them ahead of all text like an empty string.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.as_ranked(), other.as_ranked()) {
            (Ranked::Number(a), Ranked::Number(b)) => a.total_cmp(&b),
            (Ranked::Number(_), Ranked::Text(_)) => Ordering::Less,
            (Ranked::Text(_), Ranked::Number(_)) => Ordering::Greater,
            (Ranked::Text(a), Ranked::Text(b)) => a.cmp(b),
        }
    }

    fn as_ranked(&self) -> Ranked<'_> {
        match self {
            Self::Text(text) => Ranked::Text(text),
            Self::Number(number) => Ranked::Number(*number),
            Self::Missing => Ranked::Number(0.0),
        }
    }
}

enum Ranked<'a> {
    Number(f64),
    Text(&'a str),
}

/// Sort key of a node under the order rule.
///
/// A `Name` rule (any case) orders by the resolved display name, whatever
/// the record's literal `Name` field holds.
pub fn sort_key(node: &ResourceNode, rule: &OrderRule) -> SortKey {
    if rule.field.eq_ignore_ascii_case("name") {
        return SortKey::Text(node.name.to_lowercase());
    }
    node.fields
        .get(rule.field.as_str())
        .map_or(SortKey::Missing, SortKey::from_value)
}

/// Stable sort of sibling nodes by the order rule.
pub fn sort_nodes(nodes: &mut [ResourceNode], rule: &OrderRule) {
    nodes.sort_by(|a, b| {
        let ordering = sort_key(a, rule).compare(&sort_key(b, rule));
        if rule.is_descending() {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

/// Builds the ordered display tree.
///
/// Nodes are created without lanes; lanes are assigned afterwards.
pub fn build_resource_tree(
    catalog: &ResourceCatalog,
    mapping: &ResolvedMapping,
    collapsed: &BTreeSet<String>,
) -> Vec<ResourceNode> {
    let attachments = catalog.resolve_attachments(mapping.resource_parent_field.as_deref());

    let mut roots: Vec<RecordId> = Vec::new();
    let mut children_of: HashMap<RecordId, Vec<RecordId>> = HashMap::new();
    for (id, target) in &attachments {
        match target {
            Some(parent) => children_of.entry(parent.clone()).or_default().push(id.clone()),
            None => roots.push(id.clone()),
        }
    }

    let builder = TreeAssembler {
        catalog,
        mapping,
        collapsed,
        children_of: &children_of,
    };
    let mut nodes: Vec<ResourceNode> = roots
        .iter()
        .filter_map(|id| builder.node(id, 0))
        .collect();
    sort_nodes(&mut nodes, &mapping.order_rule);
    nodes
}

struct TreeAssembler<'a> {
    catalog: &'a ResourceCatalog,
    mapping: &'a ResolvedMapping,
    collapsed: &'a BTreeSet<String>,
    children_of: &'a HashMap<RecordId, Vec<RecordId>>,
}

impl TreeAssembler<'_> {
    fn node(&self, id: &str, deep_index: usize) -> Option<ResourceNode> {
        let entry = self.catalog.get(id)?;
        let record = &entry.record;

        let children = self.children_of.get(id).map(|child_ids| {
            let mut children: Vec<ResourceNode> = child_ids
                .iter()
                .filter_map(|child_id| self.node(child_id, deep_index + 1))
                .collect();
            sort_nodes(&mut children, &self.mapping.order_rule);
            children
        });

        Some(ResourceNode {
            id: record.id.clone(),
            name: record.text(&self.mapping.resource_name_field).unwrap_or_default(),
            icon: self
                .mapping
                .resource_icon_field
                .as_deref()
                .and_then(|field| record.text(field))
                .or_else(|| self.mapping.resource_icon_default.clone()),
            bookable: self
                .mapping
                .resource_bookable_field
                .as_deref()
                .map_or(true, |field| {
                    record.fields.get(field).is_some_and(value_as_flag)
                }),
            expanded: !self.collapsed.contains(id),
            deep_index,
            fields: record.fields.clone(),
            children: children.filter(|children| !children.is_empty()),
            lanes: Vec::new(),
        })
    }
}
