//! # Rackforge DRC
//!
//! Advisory placement checks for the faceplate: pairwise device overlap,
//! the split-panel exclusion band, and panel bounds. Results only drive UI
//! highlighting; nothing here blocks or changes an edit.

pub mod check;
pub mod violation;

pub use check::{
    check_bounds, check_scene, find_violations, split_band, split_intrudes, SPLIT_BAND_WIDTH_MM,
};
pub use violation::{PlacementViolation, Severity, ViolationKind};
