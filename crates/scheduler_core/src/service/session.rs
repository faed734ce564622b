//! Caller-owned scheduler session.
//!
//! # Responsibility
//! - Own the navigation state, the current display snapshot and the
//!   injected preference store of one scheduler page.
//! - Discard responses of superseded refreshes.
//! - Turn optimistic edits into save requests and recover from rejections.
//!
//! # Invariants
//! - Every refresh bumps the generation; only the latest generation may
//!   replace the snapshot.
//! - The snapshot is swapped only after a successful reshape.
//! - A rejected save drops all pending saves and asks for a full refresh.

use super::fetch::FetchError;
use super::preference_service::PreferenceService;
use crate::mapping::{FieldMapping, ResolvedMapping};
use crate::model::display::DisplayModel;
use crate::model::payload::SchedulerPayload;
use crate::model::preferences::ViewPreferences;
use crate::model::record::{FieldBag, RecordId};
use crate::repo::preference_repo::{PrefError, PreferenceStore};
use crate::reshape::columns::usable_width;
use crate::reshape::lanes::TimeAxisProjection;
use crate::reshape::pipeline::{reshape, ReshapeContext, ReshapeError};
use crate::reshape::timezone::{format_for_save, TimezoneShift};
use crate::view::window::{
    compute_window, navigate, NavigationStep, ViewMode, ViewModeKind, ViewWindow,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Horizontal units per hour used when the caller does not supply one.
pub const DEFAULT_UNITS_PER_HOUR: f64 = 1.0;

/// Errors from session operations.
#[derive(Debug)]
pub enum SessionError {
    Preferences(PrefError),
    Reshape(ReshapeError),
    Fetch(FetchError),
    /// Custom mode was requested without explicit bounds.
    CustomRangeRequired,
    /// Custom bounds are empty or inverted.
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preferences(err) => write!(f, "{err}"),
            Self::Reshape(err) => write!(f, "{err}"),
            Self::Fetch(err) => write!(f, "{err}"),
            Self::CustomRangeRequired => write!(f, "custom view requires a start and end"),
            Self::InvalidRange { start, end } => {
                write!(f, "custom view range is empty: {start} .. {end}")
            }
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Preferences(err) => Some(err),
            Self::Reshape(err) => Some(err),
            Self::Fetch(err) => Some(err),
            Self::CustomRangeRequired | Self::InvalidRange { .. } => None,
        }
    }
}

impl From<PrefError> for SessionError {
    fn from(value: PrefError) -> Self {
        Self::Preferences(value)
    }
}

impl From<ReshapeError> for SessionError {
    fn from(value: ReshapeError) -> Self {
        Self::Reshape(value)
    }
}

/// Edit rejected before any save is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// No snapshot has been loaded yet.
    NoSnapshot,
    UnknownResource(RecordId),
    NotBookable(RecordId),
    /// End is not after start.
    InvalidInterval,
    /// Stored time for the edited dates is not representable.
    OutOfRange,
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSnapshot => write!(f, "scheduler data is not loaded"),
            Self::UnknownResource(id) => write!(f, "resource not found: {id}"),
            Self::NotBookable(_) => write!(f, "This resource isn't bookable"),
            Self::InvalidInterval => write!(f, "event end must be after its start"),
            Self::OutOfRange => write!(f, "event dates are out of range"),
        }
    }
}

impl Error for EditError {}

/// Handle for one started refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    pub generation: u64,
    /// Viewer-local bounds.
    pub window: ViewWindow,
    /// Bounds for the backend query.
    pub window_utc: (DateTime<Utc>, DateTime<Utc>),
}

/// Result of delivering a refresh response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A newer refresh was started; the response was dropped.
    Stale,
}

/// Optimistic change made in the widget.
#[derive(Debug, Clone, PartialEq)]
pub struct EventChange {
    /// `None` creates a new event.
    pub event_id: Option<RecordId>,
    pub resource_id: RecordId,
    /// Displayed (viewer-shifted) instants.
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Record sent to the save endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSaveRequest {
    pub request_id: Uuid,
    pub event_id: Option<RecordId>,
    /// Mapped API fields with stored-time values.
    pub record: FieldBag,
}

struct LoadedView {
    model: DisplayModel,
    mapping: ResolvedMapping,
    shift: TimezoneShift,
}

/// Scheduler state of one page, owned by the caller.
pub struct SchedulerSession<S: PreferenceStore> {
    preferences: PreferenceService<S>,
    view_preferences: ViewPreferences,
    viewer_offset: FixedOffset,
    units_per_hour: f64,
    mode: ViewMode,
    anchor: NaiveDate,
    generation: u64,
    loaded: Option<LoadedView>,
    pending_saves: Vec<EventSaveRequest>,
}

impl<S: PreferenceStore> SchedulerSession<S> {
    /// Restores the session from stored preferences.
    ///
    /// Without a stored mode the week view is used; without a stored anchor
    /// the window opens on `today`.
    pub fn open(
        preferences: PreferenceService<S>,
        viewer_offset: FixedOffset,
        today: NaiveDate,
    ) -> Result<Self, SessionError> {
        let view_preferences = preferences.load()?;
        let mode = match (view_preferences.last_view_mode, view_preferences.custom_window) {
            (Some(ViewModeKind::Day), _) => ViewMode::Day,
            (Some(ViewModeKind::Month), _) => ViewMode::Month,
            (Some(ViewModeKind::Custom), Some(window)) => ViewMode::Custom {
                start: window.start,
                end: window.end,
            },
            _ => ViewMode::Week,
        };
        let anchor = view_preferences.last_anchor_date.unwrap_or(today);
        info!(
            "event=session_open module=service status=ok page_key={} mode={} anchor={}",
            preferences.page_key(),
            mode.kind(),
            anchor
        );
        Ok(Self {
            preferences,
            view_preferences,
            viewer_offset,
            units_per_hour: DEFAULT_UNITS_PER_HOUR,
            mode,
            anchor,
            generation: 0,
            loaded: None,
            pending_saves: Vec::new(),
        })
    }

    pub fn with_units_per_hour(mut self, units_per_hour: f64) -> Self {
        self.units_per_hour = units_per_hour;
        self
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn view_preferences(&self) -> &ViewPreferences {
        &self.view_preferences
    }

    pub fn window(&self) -> ViewWindow {
        compute_window(self.anchor, self.mode, self.viewer_offset)
    }

    pub fn snapshot(&self) -> Option<&DisplayModel> {
        self.loaded.as_ref().map(|loaded| &loaded.model)
    }

    pub fn pending_saves(&self) -> &[EventSaveRequest] {
        &self.pending_saves
    }

    /// Starts a refresh of the current window, superseding any running one.
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.generation += 1;
        let window = self.window();
        RefreshTicket {
            generation: self.generation,
            window,
            window_utc: window.to_utc(self.viewer_offset),
        }
    }

    /// Delivers the collaborator response for a refresh.
    ///
    /// # Errors
    /// - `SessionError::Fetch` when the collaborator failed.
    /// - `SessionError::Reshape` when the payload is misconfigured.
    ///
    /// In both cases the previous snapshot stays in place.
    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        response: Result<SchedulerPayload, FetchError>,
    ) -> Result<RefreshOutcome, SessionError> {
        if ticket.generation != self.generation {
            info!(
                "event=refresh module=service status=stale generation={} latest={}",
                ticket.generation, self.generation
            );
            return Ok(RefreshOutcome::Stale);
        }
        let payload = response.map_err(|err| {
            warn!(
                "event=refresh module=service status=error generation={} error={}",
                ticket.generation, err
            );
            SessionError::Fetch(err)
        })?;

        let projection =
            TimeAxisProjection::for_window(&ticket.window, self.viewer_offset, self.units_per_hour);
        let context = ReshapeContext {
            viewer_offset: self.viewer_offset,
            window: ticket.window,
            projection: &projection,
            preferences: &self.view_preferences,
        };
        let model = reshape(&payload, &context)?;
        let mapping = ResolvedMapping::resolve(&FieldMapping::from_raw(&payload.mapping))
            .map_err(ReshapeError::from)?;
        let shift = TimezoneShift::new(payload.timezone_offset, self.viewer_offset);

        self.loaded = Some(LoadedView {
            model,
            mapping,
            shift,
        });
        self.pending_saves.clear();
        Ok(RefreshOutcome::Applied)
    }

    /// Moves one window forward.
    pub fn next(&mut self) -> Result<RefreshTicket, SessionError> {
        self.step(NavigationStep::Next)
    }

    /// Moves one window backward.
    pub fn prev(&mut self) -> Result<RefreshTicket, SessionError> {
        self.step(NavigationStep::Previous)
    }

    /// Jumps to `today` and forgets the stored anchor.
    pub fn today(&mut self, today: NaiveDate) -> Result<RefreshTicket, SessionError> {
        self.anchor = today;
        self.view_preferences.last_anchor_date = None;
        self.persist_state()?;
        Ok(self.begin_refresh())
    }

    /// Switches between day, week and month views.
    ///
    /// # Errors
    /// - `SessionError::CustomRangeRequired` for `ViewModeKind::Custom`;
    ///   use `set_custom_range` instead.
    pub fn set_view_mode(&mut self, kind: ViewModeKind) -> Result<RefreshTicket, SessionError> {
        self.mode = match kind {
            ViewModeKind::Day => ViewMode::Day,
            ViewModeKind::Week => ViewMode::Week,
            ViewModeKind::Month => ViewMode::Month,
            ViewModeKind::Custom => return Err(SessionError::CustomRangeRequired),
        };
        self.view_preferences.last_view_mode = Some(kind);
        self.persist_state()?;
        Ok(self.begin_refresh())
    }

    /// Switches to an explicit window.
    pub fn set_custom_range(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<RefreshTicket, SessionError> {
        if end <= start {
            return Err(SessionError::InvalidRange { start, end });
        }
        self.mode = ViewMode::Custom { start, end };
        self.anchor = start.date();
        self.view_preferences.last_view_mode = Some(ViewModeKind::Custom);
        self.view_preferences.custom_window = Some(ViewWindow { start, end });
        self.view_preferences.last_anchor_date = Some(self.anchor);
        self.persist_state()?;
        Ok(self.begin_refresh())
    }

    pub fn collapse_node(&mut self, id: &str) -> Result<(), SessionError> {
        self.set_node_expanded(id, false)
    }

    pub fn expand_node(&mut self, id: &str) -> Result<(), SessionError> {
        self.set_node_expanded(id, true)
    }

    /// Stores resized column widths and applies them to the snapshot.
    ///
    /// Unusable widths are stored as `0` so later positions keep their
    /// column, and are skipped when applied.
    pub fn set_column_widths(&mut self, widths: Vec<f64>) -> Result<(), SessionError> {
        let widths: Vec<f64> = widths
            .into_iter()
            .map(|width| usable_width(width).unwrap_or(0.0))
            .collect();
        self.preferences.save_column_widths(&widths)?;
        if let Some(loaded) = self.loaded.as_mut() {
            for (column, width) in loaded.model.columns.iter_mut().zip(&widths) {
                if let Some(width) = usable_width(*width) {
                    column.width = Some(width);
                }
            }
        }
        self.view_preferences.column_widths = widths;
        Ok(())
    }

    /// Checks that events may be placed on a resource.
    pub fn check_bookable(&self, resource_id: &str) -> Result<(), EditError> {
        let loaded = self.loaded.as_ref().ok_or(EditError::NoSnapshot)?;
        let node = loaded
            .model
            .find_resource(resource_id)
            .ok_or_else(|| EditError::UnknownResource(resource_id.to_string()))?;
        if node.bookable {
            Ok(())
        } else {
            Err(EditError::NotBookable(resource_id.to_string()))
        }
    }

    /// Validates an optimistic edit and builds its save request.
    ///
    /// Dates are converted back to stored time with the exact inverse of
    /// the display shift.
    pub fn begin_event_edit(&mut self, change: EventChange) -> Result<EventSaveRequest, EditError> {
        if change.end_date <= change.start_date {
            return Err(EditError::InvalidInterval);
        }
        self.check_bookable(&change.resource_id)?;
        let loaded = self.loaded.as_ref().ok_or(EditError::NoSnapshot)?;

        let stored_start = loaded
            .shift
            .revert(change.start_date)
            .ok_or(EditError::OutOfRange)?;
        let stored_end = loaded
            .shift
            .revert(change.end_date)
            .ok_or(EditError::OutOfRange)?;

        let mut record = FieldBag::new();
        record.insert(
            loaded.mapping.event_start_field.clone(),
            Value::String(format_for_save(stored_start)),
        );
        record.insert(
            loaded.mapping.event_end_field.clone(),
            Value::String(format_for_save(stored_end)),
        );
        record.insert(
            loaded.mapping.event_parent_resource_field.clone(),
            Value::String(change.resource_id.clone()),
        );
        if let Some(id) = change.event_id.as_ref() {
            record.insert("Id".to_string(), Value::String(id.clone()));
        }

        let request = EventSaveRequest {
            request_id: Uuid::new_v4(),
            event_id: change.event_id,
            record,
        };
        self.pending_saves.push(request.clone());
        Ok(request)
    }

    /// Marks a save as accepted. Returns whether it was pending.
    pub fn confirm_save(&mut self, request_id: Uuid) -> bool {
        let before = self.pending_saves.len();
        self.pending_saves
            .retain(|request| request.request_id != request_id);
        before != self.pending_saves.len()
    }

    /// Handles a rejected save.
    ///
    /// Returns the message to show and the ticket of the refresh that
    /// restores the server state.
    pub fn reject_save(&mut self, request_id: Uuid, error: &FetchError) -> (String, RefreshTicket) {
        let message = error.user_message();
        warn!(
            "event=save module=service status=rejected request_id={} dropped_pending={} error={}",
            request_id,
            self.pending_saves.len(),
            error
        );
        self.pending_saves.clear();
        (message, self.begin_refresh())
    }

    fn step(&mut self, step: NavigationStep) -> Result<RefreshTicket, SessionError> {
        self.anchor = navigate(self.anchor, self.mode, step);
        self.view_preferences.last_anchor_date = Some(self.anchor);
        self.persist_state()?;
        Ok(self.begin_refresh())
    }

    fn set_node_expanded(&mut self, id: &str, expanded: bool) -> Result<(), SessionError> {
        if expanded {
            self.view_preferences.collapsed_resource_ids.remove(id);
        } else {
            self.view_preferences
                .collapsed_resource_ids
                .insert(id.to_string());
        }
        self.persist_state()?;
        if let Some(loaded) = self.loaded.as_mut() {
            loaded.model.set_expanded(id, expanded);
        }
        Ok(())
    }

    fn persist_state(&self) -> Result<(), SessionError> {
        self.preferences.save_state(&self.view_preferences)?;
        Ok(())
    }
}
