//! Flutter-facing bindings for the scheduler core.

pub mod api;
