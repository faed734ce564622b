//! Viewer preferences carried across sessions.

use crate::view::window::{ViewModeKind, ViewWindow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-page viewer state restored on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewPreferences {
    /// Resource column widths by position.
    pub column_widths: Vec<f64>,
    /// Ids of tree nodes the viewer collapsed.
    pub collapsed_resource_ids: BTreeSet<String>,
    pub last_view_mode: Option<ViewModeKind>,
    /// `None` means "today".
    pub last_anchor_date: Option<NaiveDate>,
    /// Bounds of the last custom window, when the mode is custom.
    pub custom_window: Option<ViewWindow>,
}

impl ViewPreferences {
    pub fn is_collapsed(&self, id: &str) -> bool {
        self.collapsed_resource_ids.contains(id)
    }
}
