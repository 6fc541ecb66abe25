use thiserror::Error;

use crate::device::DeviceId;

/// Errors raised by scene edits and scene validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Device {0} not found")]
    DeviceNotFound(DeviceId),

    #[error("Device {0} is already placed")]
    DuplicateDevice(DeviceId),

    #[error("Unknown catalog device '{0}'")]
    UnknownCatalogId(String),

    #[error("Invalid dimensions {width}x{height}x{depth}: every side must be positive")]
    InvalidDimensions { width: f64, height: f64, depth: f64 },

    #[error("Invalid offset ({x}, {y})")]
    InvalidOffset { x: f64, y: f64 },

    #[error("Rack unit count {0} out of range (1..={max})", max = crate::rack::MAX_RACK_UNITS)]
    InvalidRackUnits(u8),

    #[error("Split line is locked")]
    SplitLocked,

    #[error("Panel is not in split mode")]
    NotSplit,

    #[error("Split mode requires a side for new devices")]
    SideRequired,
}
