//! Scheduler data model.
//!
//! # Responsibility
//! - Define raw backend records and the payload envelope.
//! - Define the display snapshot produced by one reshape pass.
//! - Define the viewer preferences restored between sessions.
//!
//! # Invariants
//! - Records are identified by backend ids; relations are weak id references.
//! - Display snapshots are rebuilt per pass, never patched.

pub mod display;
pub mod payload;
pub mod preferences;
pub mod record;
pub mod warning;
