//! # Rackforge I/O
//!
//! Scene serialization in both directions: the kernel program text handed
//! to the solid-modeling kernel, and the JSON scene document used for
//! saving, loading and exporting designs.

pub mod project;
pub mod scad;

pub use project::{ProjectError, SceneDocument};
pub use scad::{serialize, serialize_side};
