//! Persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the injected preference store interface.
//! - Isolate SQLite query details from session orchestration.

pub mod preference_repo;

pub use preference_repo::{
    MemoryPreferenceStore, PrefError, PrefResult, PreferenceStore, SqlitePreferenceStore,
};
