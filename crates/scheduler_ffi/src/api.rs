//! FFI use-case API for the embedding UI.
//!
//! # Responsibility
//! - Expose synchronous JSON-in / JSON-out scheduler calls via FRB.
//! - Resolve viewer preferences from the per-process preference database.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - Failures come back as response envelopes with a message, not errors.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use scheduler_core::db::open_db;
use scheduler_core::service::clean_backend_message;
use scheduler_core::{
    compute_window, core_version as core_version_inner, init_logging as init_logging_inner,
    reshape, PreferenceService, ReshapeContext, SchedulerPayload, SqlitePreferenceStore,
    TimeAxisProjection, ViewMode, ViewModeKind, ViewPreferences, ViewWindow,
};
use std::path::PathBuf;
use std::sync::OnceLock;

const PREFS_DB_FILE_NAME: &str = "scheduler_prefs.sqlite3";
const PREFS_DB_ENV: &str = "SCHEDULER_PREFS_DB_PATH";
const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
static PREFS_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Core crate version.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// Returns an empty string on success and the error message otherwise.
/// Repeating the same `level + log_dir` is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// View window request shared by window and reshape calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    /// `YYYY-MM-DD`.
    pub anchor_date: String,
    /// `day|week|month|custom`.
    pub view_mode: String,
    /// Viewer offset east of UTC, in minutes.
    pub viewer_offset_minutes: i32,
    /// `YYYY-MM-DDTHH:MM:SS`, custom mode only.
    pub custom_start: Option<String>,
    pub custom_end: Option<String>,
}

/// JSON response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    pub ok: bool,
    /// Serialized result; empty on failure.
    pub json: String,
    pub message: String,
}

impl JsonResponse {
    fn success(json: String) -> Self {
        Self {
            ok: true,
            json,
            message: String::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            json: String::new(),
            message: message.into(),
        }
    }
}

/// Computes the visible window as `{"start": .., "end": ..}`.
#[flutter_rust_bridge::frb(sync)]
pub fn view_window_json(request: WindowRequest) -> JsonResponse {
    respond(resolve_window(&request).and_then(|(window, _)| to_json(&window)))
}

/// Reshapes one backend payload for `page_key`.
///
/// Collapsed nodes and column widths come from the stored preferences of
/// the page; a page without stored preferences uses defaults.
#[flutter_rust_bridge::frb(sync)]
pub fn reshape_payload_json(
    payload_json: String,
    request: WindowRequest,
    page_key: String,
) -> JsonResponse {
    respond(reshape_inner(&payload_json, &request, &page_key))
}

/// Stores resized column widths for `page_key`.
///
/// Returns an empty string on success and the error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn save_column_widths(page_key: String, widths: Vec<f64>) -> String {
    with_preferences(&page_key, |service| {
        service
            .save_column_widths(&widths)
            .map_err(|err| err.to_string())
    })
    .err()
    .unwrap_or_default()
}

/// Reduces a backend error message to its user-facing text.
#[flutter_rust_bridge::frb(sync)]
pub fn clean_error_message(message: String) -> String {
    clean_backend_message(&message)
}

fn reshape_inner(
    payload_json: &str,
    request: &WindowRequest,
    page_key: &str,
) -> Result<String, String> {
    let payload: SchedulerPayload =
        serde_json::from_str(payload_json).map_err(|err| format!("invalid payload: {err}"))?;
    let (window, viewer_offset) = resolve_window(request)?;
    let preferences = load_preferences(page_key)?;
    let projection = TimeAxisProjection::for_window(&window, viewer_offset, 1.0);
    let model = reshape(
        &payload,
        &ReshapeContext {
            viewer_offset,
            window,
            projection: &projection,
            preferences: &preferences,
        },
    )
    .map_err(|err| err.to_string())?;
    to_json(&model)
}

fn resolve_window(request: &WindowRequest) -> Result<(ViewWindow, FixedOffset), String> {
    let anchor = NaiveDate::parse_from_str(request.anchor_date.trim(), DATE_FORMAT)
        .map_err(|err| format!("invalid anchor date `{}`: {err}", request.anchor_date))?;
    let viewer_offset = FixedOffset::east_opt(request.viewer_offset_minutes.saturating_mul(60))
        .ok_or_else(|| format!("invalid viewer offset {}", request.viewer_offset_minutes))?;
    let mode = match request.view_mode.parse::<ViewModeKind>()? {
        ViewModeKind::Day => ViewMode::Day,
        ViewModeKind::Week => ViewMode::Week,
        ViewModeKind::Month => ViewMode::Month,
        ViewModeKind::Custom => ViewMode::Custom {
            start: parse_date_time(request.custom_start.as_deref())?,
            end: parse_date_time(request.custom_end.as_deref())?,
        },
    };
    Ok((compute_window(anchor, mode, viewer_offset), viewer_offset))
}

fn parse_date_time(raw: Option<&str>) -> Result<NaiveDateTime, String> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty());
    let raw = raw.ok_or_else(|| "custom view requires start and end".to_string())?;
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
        .map_err(|err| format!("invalid date-time `{raw}`: {err}"))
}

fn load_preferences(page_key: &str) -> Result<ViewPreferences, String> {
    if page_key.trim().is_empty() {
        return Ok(ViewPreferences::default());
    }
    with_preferences(page_key, |service| service.load().map_err(|err| err.to_string()))
}

fn resolve_prefs_db_path() -> PathBuf {
    PREFS_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(PREFS_DB_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(PREFS_DB_FILE_NAME)
        })
        .clone()
}

fn with_preferences<T>(
    page_key: &str,
    f: impl FnOnce(&PreferenceService<SqlitePreferenceStore<'_>>) -> Result<T, String>,
) -> Result<T, String> {
    let conn = open_db(resolve_prefs_db_path())
        .map_err(|err| format!("preference DB open failed: {err}"))?;
    let store = SqlitePreferenceStore::try_new(&conn)
        .map_err(|err| format!("preference store init failed: {err}"))?;
    f(&PreferenceService::new(store, page_key))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|err| format!("serialization failed: {err}"))
}

fn respond(result: Result<String, String>) -> JsonResponse {
    match result {
        Ok(json) => JsonResponse::success(json),
        Err(message) => {
            log::warn!("event=ffi_call module=ffi status=error message={message}");
            JsonResponse::failure(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week_request(anchor: &str) -> WindowRequest {
        WindowRequest {
            anchor_date: anchor.to_string(),
            view_mode: "week".to_string(),
            viewer_offset_minutes: 0,
            custom_start: None,
            custom_end: None,
        }
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "/tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn view_window_for_sunday_starts_previous_monday() {
        let response = view_window_json(week_request("2024-03-17"));
        assert!(response.ok, "{}", response.message);
        let value: serde_json::Value = serde_json::from_str(&response.json).expect("json");
        assert_eq!(value["start"], "2024-03-11T00:00:00");
        assert_eq!(value["end"], "2024-03-18T00:00:00");
    }

    #[test]
    fn custom_window_requires_bounds() {
        let mut request = week_request("2024-03-17");
        request.view_mode = "custom".to_string();
        let response = view_window_json(request);
        assert!(!response.ok);
        assert!(response.message.contains("custom"));
    }

    #[test]
    fn reshape_reports_configuration_errors() {
        let response = reshape_payload_json(
            r#"{"mapping": {}}"#.to_string(),
            week_request("2024-03-17"),
            String::new(),
        );
        assert!(!response.ok);
        assert!(response.message.contains("Event_Start_Date_API_Field__c"));
    }

    #[test]
    fn clean_error_message_strips_validation_envelope() {
        assert_eq!(
            clean_error_message(
                "FIELD_CUSTOM_VALIDATION_EXCEPTION, Room is closed: []".to_string()
            ),
            "Room is closed"
        );
    }
}
