use serde::{Deserialize, Serialize};

use rackforge_core::{BBox, DeviceId};

/// What a placement check found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Effective footprints of two devices overlap.
    Overlap { other: DeviceId },
    /// Device (with walls) intrudes into the split exclusion band.
    SplitZone,
    /// Device (with walls) leaves the usable panel area.
    OutOfBounds,
}

/// Severity level of a placement violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single placement violation with location and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementViolation {
    pub device_id: DeviceId,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    /// Region to highlight: [min_x, min_y, max_x, max_y] in mm.
    pub bbox: [f64; 4],
}

impl PlacementViolation {
    pub(crate) fn new(device_id: DeviceId, kind: ViolationKind, message: String, region: BBox) -> Self {
        Self {
            device_id,
            kind,
            severity: Severity::Error,
            message,
            bbox: [region.min.x, region.min.y, region.max.x, region.max.y],
        }
    }
}
