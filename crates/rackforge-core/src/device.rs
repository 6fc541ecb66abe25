use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog;
use crate::error::CoreError;
use crate::geometry::{BBox, Point};

/// Unique device instance identifier.
pub type DeviceId = Uuid;

/// Wall thickness of the shrink-wrap cage printed around an enclosed device (mm).
pub const CAGE_WALL_MM: f64 = 4.0;

/// How a device attaches behind the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountType {
    /// Shrink-wrap cage hugging the device outline.
    Cage,
    /// Cage with a rectangular front opening instead of a full cutout.
    CageRect,
    /// Open tray the device sits on.
    Tray,
    /// Pair of L-brackets screwed to the device sides.
    Bracket,
    /// Plain cutout, device is held by its own flange.
    Passthrough,
    /// No enclosure at all.
    None,
}

impl MountType {
    pub const ALL: [MountType; 6] = [
        MountType::Cage,
        MountType::CageRect,
        MountType::Tray,
        MountType::Bracket,
        MountType::Passthrough,
        MountType::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MountType::Cage => "cage",
            MountType::CageRect => "cage_rect",
            MountType::Tray => "tray",
            MountType::Bracket => "bracket",
            MountType::Passthrough => "passthrough",
            MountType::None => "none",
        }
    }

    /// Margin added around the device footprint for its enclosure walls.
    pub fn wall_margin(&self) -> f64 {
        match self {
            MountType::None => 0.0,
            _ => CAGE_WALL_MM,
        }
    }
}

impl Default for MountType {
    fn default() -> Self {
        MountType::Cage
    }
}

/// Back-panel style, panel-wide or overridden per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackStyle {
    Solid,
    Vent,
    Honeycomb,
    None,
}

impl BackStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackStyle::Solid => "solid",
            BackStyle::Vent => "vent",
            BackStyle::Honeycomb => "honeycomb",
            BackStyle::None => "none",
        }
    }
}

/// Physical device size in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64, depth: f64) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let ok = [self.width, self.height, self.depth]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if ok {
            Ok(())
        } else {
            Err(CoreError::InvalidDimensions {
                width: self.width,
                height: self.height,
                depth: self.depth,
            })
        }
    }
}

/// Where a placed device's model comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceSource {
    Catalog { id: String },
    Custom { name: String, dimensions: Dimensions },
}

/// A device instance on the faceplate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedDevice {
    pub id: DeviceId,
    pub source: DeviceSource,
    /// Center offset from the panel center, in mm.
    pub offset_x: f64,
    pub offset_y: f64,
    pub mount_type: MountType,
    /// Per-device back style; `None` uses the panel-wide style.
    pub back_style: Option<BackStyle>,
}

impl PlacedDevice {
    /// Place a catalog device at the given offset.
    pub fn from_catalog(catalog_id: &str, offset_x: f64, offset_y: f64) -> Result<Self, CoreError> {
        let device = Self {
            id: Uuid::new_v4(),
            source: DeviceSource::Catalog {
                id: catalog_id.to_string(),
            },
            offset_x,
            offset_y,
            mount_type: MountType::default(),
            back_style: None,
        };
        device.validate()?;
        Ok(device)
    }

    /// Place a custom-sized device at the given offset.
    pub fn custom(
        name: &str,
        dimensions: Dimensions,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<Self, CoreError> {
        let device = Self {
            id: Uuid::new_v4(),
            source: DeviceSource::Custom {
                name: name.to_string(),
                dimensions,
            },
            offset_x,
            offset_y,
            mount_type: MountType::default(),
            back_style: None,
        };
        device.validate()?;
        Ok(device)
    }

    pub fn with_mount_type(mut self, mount_type: MountType) -> Self {
        self.mount_type = mount_type;
        self
    }

    pub fn with_back_style(mut self, back_style: Option<BackStyle>) -> Self {
        self.back_style = back_style;
        self
    }

    /// Check the source resolves and all numbers are usable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.offset_x.is_finite() || !self.offset_y.is_finite() {
            return Err(CoreError::InvalidOffset {
                x: self.offset_x,
                y: self.offset_y,
            });
        }
        match &self.source {
            DeviceSource::Catalog { id } => {
                catalog::lookup(id).ok_or_else(|| CoreError::UnknownCatalogId(id.clone()))?;
                Ok(())
            }
            DeviceSource::Custom { dimensions, .. } => dimensions.validate(),
        }
    }

    /// Resolved physical size. `None` only for an unknown catalog id.
    pub fn dimensions(&self) -> Option<Dimensions> {
        match &self.source {
            DeviceSource::Catalog { id } => catalog::lookup(id).map(|e| e.dimensions()),
            DeviceSource::Custom { dimensions, .. } => Some(*dimensions),
        }
    }

    pub fn display_name(&self) -> &str {
        match &self.source {
            DeviceSource::Catalog { id } => catalog::lookup(id).map(|e| e.name).unwrap_or(id.as_str()),
            DeviceSource::Custom { name, .. } => name,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.offset_x, self.offset_y)
    }

    /// Front-face footprint on the panel.
    pub fn footprint(&self) -> Option<BBox> {
        self.dimensions()
            .map(|d| BBox::from_center(self.center(), d.width, d.height))
    }

    /// Footprint grown by the enclosure wall margin of the mount type.
    pub fn effective_footprint(&self) -> Option<BBox> {
        self.footprint()
            .map(|b| b.expand(self.mount_type.wall_margin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_device_resolves_dimensions() {
        let d = PlacedDevice::from_catalog("hex-s", 10.0, 0.0).unwrap();
        let dims = d.dimensions().unwrap();
        assert_eq!(dims.width, 113.0);
        assert_eq!(d.display_name(), "MikroTik hEX S");
    }

    #[test]
    fn test_unknown_catalog_rejected() {
        let err = PlacedDevice::from_catalog("toaster", 0.0, 0.0).unwrap_err();
        assert_eq!(err, CoreError::UnknownCatalogId("toaster".into()));
    }

    #[test]
    fn test_custom_dimensions_must_be_positive() {
        let err = PlacedDevice::custom("box", Dimensions::new(10.0, 0.0, 5.0), 0.0, 0.0);
        assert!(matches!(err, Err(CoreError::InvalidDimensions { .. })));
        let err = PlacedDevice::custom("box", Dimensions::new(f64::NAN, 1.0, 5.0), 0.0, 0.0);
        assert!(err.is_err());
    }

    #[test]
    fn test_effective_footprint_margin() {
        let d = PlacedDevice::custom("box", Dimensions::new(100.0, 40.0, 50.0), 0.0, 0.0).unwrap();
        let fp = d.effective_footprint().unwrap();
        assert_eq!(fp.width(), 108.0);

        let bare = d.with_mount_type(MountType::None);
        assert_eq!(bare.effective_footprint().unwrap().width(), 100.0);
    }
}
