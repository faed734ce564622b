//! Scheduler use-case services.
//!
//! # Responsibility
//! - Orchestrate refresh, navigation and edit flows around the reshape
//!   engine.
//! - Keep embedding layers decoupled from storage details.

pub mod fetch;
pub mod preference_service;
pub mod session;

pub use fetch::{clean_backend_message, FetchError};
pub use preference_service::PreferenceService;
pub use session::{
    EditError, EventChange, EventSaveRequest, RefreshOutcome, RefreshTicket, SchedulerSession,
    SessionError,
};
