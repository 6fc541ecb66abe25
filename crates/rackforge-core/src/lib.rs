//! # Rackforge Core
//!
//! Scene model for rack faceplates: the device catalog, placed devices,
//! the `RackConfig` scene with its split-panel layout, the geometry
//! fingerprint used to skip no-op renders, R-tree hit-testing, and
//! undo/redo via a command-pattern journal.
//!
//! All coordinates are physical millimeters with the origin at the panel
//! center and Y pointing up.

pub mod catalog;
pub mod commands;
pub mod device;
pub mod error;
pub mod geometry;
pub mod hash;
pub mod rack;
pub mod session;
pub mod spatial;

pub use device::{BackStyle, DeviceId, DeviceSource, Dimensions, MountType, PlacedDevice};
pub use error::CoreError;
pub use geometry::{BBox, Point};
pub use hash::SceneHash;
pub use rack::{
    CameraState, DeviceLayout, EarStyle, RackConfig, RackWidth, Side, SplitLine, StyleParams,
    VentStyle,
};
pub use session::RackSession;
pub use spatial::DeviceIndex;
