//! Geometry fingerprint of a scene.
//!
//! Covers every field that changes the rendered model and nothing else:
//! device ids and the viewer camera are left out, so selecting, orbiting or
//! re-identifying devices never triggers a render.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::device::{DeviceSource, PlacedDevice};
use crate::rack::{DeviceLayout, RackConfig};

/// Order-sensitive fingerprint of the geometry-relevant scene fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneHash(pub u64);

impl fmt::Display for SceneHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hash a float by bit pattern, folding -0.0 into 0.0.
fn hash_f64<H: Hasher>(value: f64, state: &mut H) {
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_bits().hash(state);
}

fn hash_device<H: Hasher>(device: &PlacedDevice, state: &mut H) {
    match &device.source {
        DeviceSource::Catalog { id } => {
            0u8.hash(state);
            id.hash(state);
        }
        DeviceSource::Custom { name, dimensions } => {
            1u8.hash(state);
            name.hash(state);
            hash_f64(dimensions.width, state);
            hash_f64(dimensions.height, state);
            hash_f64(dimensions.depth, state);
        }
    }
    hash_f64(device.offset_x, state);
    hash_f64(device.offset_y, state);
    device.mount_type.hash(state);
    device.back_style.hash(state);
}

fn hash_list<H: Hasher>(devices: &[PlacedDevice], state: &mut H) {
    devices.len().hash(state);
    for device in devices {
        hash_device(device, state);
    }
}

impl RackConfig {
    /// Fingerprint of everything that affects the rendered geometry.
    pub fn snapshot_hash(&self) -> SceneHash {
        let mut state = DefaultHasher::new();
        self.rack_u.hash(&mut state);
        self.rack_width.hash(&mut state);
        self.ear_style.hash(&mut state);
        self.back_style.hash(&mut state);
        self.vent_style.hash(&mut state);
        hash_f64(self.style.panel_thickness, &mut state);
        hash_f64(self.style.corner_radius, &mut state);
        hash_f64(self.style.ear_width, &mut state);
        hash_f64(self.style.vent_size, &mut state);
        hash_f64(self.style.vent_spacing, &mut state);
        match &self.layout {
            DeviceLayout::Single { devices } => {
                0u8.hash(&mut state);
                hash_list(devices, &mut state);
            }
            // The lock flag only guards editing, the geometry is the same.
            DeviceLayout::Split { split, left, right } => {
                1u8.hash(&mut state);
                hash_f64(split.offset, &mut state);
                hash_list(left, &mut state);
                hash_list(right, &mut state);
            }
        }
        SceneHash(state.finish())
    }
}
