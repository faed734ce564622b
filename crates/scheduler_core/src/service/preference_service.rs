//! Viewer preference use-cases.
//!
//! # Responsibility
//! - Map `ViewPreferences` onto the string-keyed store of one page.
//! - Tolerate corrupt stored values by falling back to defaults.
//!
//! # Invariants
//! - All keys are scoped by the page identity passed at construction.
//! - Column widths and scheduler state are stored under separate keys so
//!   a width drag never rewrites navigation state.

use crate::model::preferences::ViewPreferences;
use crate::repo::preference_repo::{PrefResult, PreferenceStore};
use crate::view::window::{ViewModeKind, ViewWindow};
use chrono::NaiveDate;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SCHEDULER_STATE_KEY: &str = "scheduler_state";
pub const COLUMN_WIDTHS_KEY: &str = "column_widths";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredState {
    view_mode: Option<ViewModeKind>,
    anchor_date: Option<NaiveDate>,
    collapsed_resources: BTreeSet<String>,
    custom_window: Option<ViewWindow>,
}

/// Preference facade for one scheduler page.
pub struct PreferenceService<S: PreferenceStore> {
    store: S,
    page_key: String,
}

impl<S: PreferenceStore> PreferenceService<S> {
    pub fn new(store: S, page_key: impl Into<String>) -> Self {
        Self {
            store,
            page_key: page_key.into(),
        }
    }

    pub fn page_key(&self) -> &str {
        &self.page_key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the page preferences.
    ///
    /// # Errors
    /// - Returns store failures. Undecodable values are logged and replaced
    ///   by defaults instead.
    pub fn load(&self) -> PrefResult<ViewPreferences> {
        let state: StoredState = self.read_json(SCHEDULER_STATE_KEY)?.unwrap_or_default();
        let column_widths: Vec<f64> = self.read_json(COLUMN_WIDTHS_KEY)?.unwrap_or_default();
        Ok(ViewPreferences {
            column_widths,
            collapsed_resource_ids: state.collapsed_resources,
            last_view_mode: state.view_mode,
            last_anchor_date: state.anchor_date,
            custom_window: state.custom_window,
        })
    }

    /// Persists navigation state and collapsed nodes.
    pub fn save_state(&self, preferences: &ViewPreferences) -> PrefResult<()> {
        let state = StoredState {
            view_mode: preferences.last_view_mode,
            anchor_date: preferences.last_anchor_date,
            collapsed_resources: preferences.collapsed_resource_ids.clone(),
            custom_window: preferences.custom_window,
        };
        self.write_json(SCHEDULER_STATE_KEY, &state)
    }

    /// Persists column widths.
    pub fn save_column_widths(&self, widths: &[f64]) -> PrefResult<()> {
        self.write_json(COLUMN_WIDTHS_KEY, widths)
    }

    /// Drops every stored preference of the page.
    pub fn clear(&self) -> PrefResult<()> {
        self.store.remove(&self.page_key, SCHEDULER_STATE_KEY)?;
        self.store.remove(&self.page_key, COLUMN_WIDTHS_KEY)
    }

    fn read_json<T: DeserializeOwned>(&self, pref_key: &str) -> PrefResult<Option<T>> {
        let Some(raw) = self.store.get(&self.page_key, pref_key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(
                    "event=prefs_read module=service status=corrupt page_key={} pref_key={} error={}",
                    self.page_key, pref_key, err
                );
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, pref_key: &str, value: &T) -> PrefResult<()> {
        let encoded = serde_json::to_string(value)?;
        self.store.set(&self.page_key, pref_key, &encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::preference_repo::MemoryPreferenceStore;

    #[test]
    fn empty_store_loads_defaults() {
        let service = PreferenceService::new(MemoryPreferenceStore::new(), "page");
        assert_eq!(service.load().expect("load"), ViewPreferences::default());
    }

    #[test]
    fn state_and_widths_round_trip_per_page() {
        let service = PreferenceService::new(MemoryPreferenceStore::new(), "page");
        let preferences = ViewPreferences {
            column_widths: vec![200.0, 80.5],
            collapsed_resource_ids: ["r1".to_string()].into_iter().collect(),
            last_view_mode: Some(ViewModeKind::Month),
            last_anchor_date: NaiveDate::from_ymd_opt(2024, 2, 10),
            custom_window: None,
        };
        service.save_state(&preferences).expect("save state");
        service
            .save_column_widths(&preferences.column_widths)
            .expect("save widths");

        assert_eq!(service.load().expect("load"), preferences);
    }

    #[test]
    fn corrupt_value_falls_back_to_default() {
        let store = MemoryPreferenceStore::new();
        store
            .set("page", SCHEDULER_STATE_KEY, "{not json")
            .expect("raw write");
        store
            .set("page", COLUMN_WIDTHS_KEY, "[120]")
            .expect("raw write");
        let service = PreferenceService::new(store, "page");

        let loaded = service.load().expect("load");
        assert_eq!(loaded.last_view_mode, None);
        assert_eq!(loaded.column_widths, vec![120.0]);
    }

    #[test]
    fn clear_removes_both_keys() {
        let service = PreferenceService::new(MemoryPreferenceStore::new(), "page");
        service.save_column_widths(&[1.0]).expect("save");
        service.save_state(&ViewPreferences::default()).expect("save");
        service.clear().expect("clear");
        assert!(service.store().is_empty());
    }
}
