//! Scheduler reshaping core.
//!
//! Turns flat backend resource and event records into the ordered resource
//! tree, overlap-free event lanes and timezone-normalized dates a timeline
//! widget renders, and owns the session state around refreshes and edits.

pub mod db;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod repo;
pub mod reshape;
pub mod service;
pub mod view;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use mapping::{ConfigurationError, FieldMapping, OrderRule, ResolvedMapping};
pub use model::display::{
    ColumnDescriptor, DisplayEvent, DisplayModel, EventLane, LaneEntry, ResourceNode,
    TimeRangeBlock, UnassignedBucket,
};
pub use model::payload::SchedulerPayload;
pub use model::preferences::ViewPreferences;
pub use model::record::{RawEvent, RawResource, RawTimeRange, RecordId};
pub use model::warning::DataIntegrityWarning;
pub use repo::{
    MemoryPreferenceStore, PrefError, PrefResult, PreferenceStore, SqlitePreferenceStore,
};
pub use reshape::{
    reshape, ReshapeContext, ReshapeError, ReshapeResult, TimeAxisProjection, VisualProjection,
    VisualSpan,
};
pub use service::{
    EditError, EventChange, EventSaveRequest, FetchError, PreferenceService, RefreshOutcome,
    RefreshTicket, SchedulerSession, SessionError,
};
pub use view::{compute_window, navigate, NavigationStep, ViewMode, ViewModeKind, ViewWindow};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
