//! View window derivation for the scheduler timeline.

pub mod window;

pub use window::{
    compute_window, navigate, week_start, NavigationStep, ViewMode, ViewModeKind, ViewWindow,
};
