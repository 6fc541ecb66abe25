use serde::{Deserialize, Serialize};

use crate::device::{BackStyle, DeviceId, MountType, PlacedDevice};
use crate::error::CoreError;
use crate::geometry::{BBox, Point};

/// Height of one rack unit in mm.
pub const RACK_UNIT_MM: f64 = 44.45;

/// Largest supported panel.
pub const MAX_RACK_UNITS: u8 = 12;

/// Rack standard, which fixes the panel face width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RackWidth {
    #[serde(rename = "19in")]
    Inch19,
    #[serde(rename = "10in")]
    Inch10,
}

impl RackWidth {
    pub fn as_str(&self) -> &'static str {
        match self {
            RackWidth::Inch19 => "19in",
            RackWidth::Inch10 => "10in",
        }
    }

    /// Full face width including the ears.
    pub fn panel_width(&self) -> f64 {
        match self {
            RackWidth::Inch19 => 482.6,
            RackWidth::Inch10 => 254.0,
        }
    }

    /// Opening between the rack rails, where devices may sit.
    pub fn usable_width(&self) -> f64 {
        match self {
            RackWidth::Inch19 => 450.0,
            RackWidth::Inch10 => 222.25,
        }
    }
}

impl Default for RackWidth {
    fn default() -> Self {
        RackWidth::Inch19
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarStyle {
    Standard,
    Toolless,
    None,
}

impl EarStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarStyle::Standard => "standard",
            EarStyle::Toolless => "toolless",
            EarStyle::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VentStyle {
    Slots,
    Hex,
    Circles,
    None,
}

impl VentStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VentStyle::Slots => "slots",
            VentStyle::Hex => "hex",
            VentStyle::Circles => "circles",
            VentStyle::None => "none",
        }
    }
}

/// Numeric style parameters, all in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleParams {
    pub panel_thickness: f64,
    pub corner_radius: f64,
    pub ear_width: f64,
    pub vent_size: f64,
    pub vent_spacing: f64,
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            panel_thickness: 4.0,
            corner_radius: 2.0,
            ear_width: 16.3,
            vent_size: 6.0,
            vent_spacing: 2.5,
        }
    }
}

/// Join line of a split panel, as an x offset from panel center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitLine {
    pub offset: f64,
    /// A locked split line cannot be moved.
    pub locked: bool,
}

impl SplitLine {
    pub fn new(offset: f64) -> Self {
        Self {
            offset,
            locked: false,
        }
    }
}

/// Half of a split panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Device lists of the panel. Exactly one shape is populated at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeviceLayout {
    Single {
        devices: Vec<PlacedDevice>,
    },
    Split {
        split: SplitLine,
        left: Vec<PlacedDevice>,
        right: Vec<PlacedDevice>,
    },
}

impl Default for DeviceLayout {
    fn default() -> Self {
        DeviceLayout::Single {
            devices: Vec::new(),
        }
    }
}

/// Viewer camera state. UI-only: never affects geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
}

/// A device taken out of the scene, with enough context to put it back.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedDevice {
    pub device: PlacedDevice,
    pub side: Option<Side>,
    pub index: usize,
}

/// The full scene: panel, styles and device placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackConfig {
    pub rack_u: u8,
    pub rack_width: RackWidth,
    pub ear_style: EarStyle,
    pub back_style: BackStyle,
    pub vent_style: VentStyle,
    pub style: StyleParams,
    pub layout: DeviceLayout,
    #[serde(default)]
    pub camera: Option<CameraState>,
}

impl Default for RackConfig {
    fn default() -> Self {
        Self {
            rack_u: 1,
            rack_width: RackWidth::default(),
            ear_style: EarStyle::Standard,
            back_style: BackStyle::Vent,
            vent_style: VentStyle::Slots,
            style: StyleParams::default(),
            layout: DeviceLayout::default(),
            camera: None,
        }
    }
}

impl RackConfig {
    pub fn new(rack_u: u8) -> Result<Self, CoreError> {
        let mut config = Self::default();
        config.set_rack_u(rack_u)?;
        Ok(config)
    }

    // ── Panel geometry ───────────────────────────────────────────────

    pub fn panel_width(&self) -> f64 {
        self.rack_width.panel_width()
    }

    pub fn panel_height(&self) -> f64 {
        self.rack_u as f64 * RACK_UNIT_MM
    }

    /// Area devices (including their enclosures) must stay inside.
    pub fn usable_area(&self) -> BBox {
        BBox::from_center(
            Point::new(0.0, 0.0),
            self.rack_width.usable_width(),
            self.panel_height(),
        )
    }

    pub fn set_rack_u(&mut self, rack_u: u8) -> Result<(), CoreError> {
        if rack_u == 0 || rack_u > MAX_RACK_UNITS {
            return Err(CoreError::InvalidRackUnits(rack_u));
        }
        self.rack_u = rack_u;
        Ok(())
    }

    // ── Device queries ───────────────────────────────────────────────

    pub fn is_split(&self) -> bool {
        matches!(self.layout, DeviceLayout::Split { .. })
    }

    pub fn split_line(&self) -> Option<&SplitLine> {
        match &self.layout {
            DeviceLayout::Split { split, .. } => Some(split),
            DeviceLayout::Single { .. } => None,
        }
    }

    /// Every device, left half before right half in split mode.
    pub fn devices(&self) -> impl Iterator<Item = &PlacedDevice> {
        let (first, second): (&[PlacedDevice], &[PlacedDevice]) = match &self.layout {
            DeviceLayout::Single { devices } => (devices.as_slice(), &[]),
            DeviceLayout::Split { left, right, .. } => (left.as_slice(), right.as_slice()),
        };
        first.iter().chain(second.iter())
    }

    pub fn device_count(&self) -> usize {
        self.devices().count()
    }

    pub fn device(&self, id: &DeviceId) -> Option<&PlacedDevice> {
        self.devices().find(|d| d.id == *id)
    }

    fn device_mut(&mut self, id: &DeviceId) -> Result<&mut PlacedDevice, CoreError> {
        let found = match &mut self.layout {
            DeviceLayout::Single { devices } => devices.iter_mut().find(|d| d.id == *id),
            DeviceLayout::Split { left, right, .. } => left
                .iter_mut()
                .chain(right.iter_mut())
                .find(|d| d.id == *id),
        };
        found.ok_or(CoreError::DeviceNotFound(*id))
    }

    /// Which half holds the device, `None` in single mode or if absent.
    pub fn side_of(&self, id: &DeviceId) -> Option<Side> {
        match &self.layout {
            DeviceLayout::Single { .. } => None,
            DeviceLayout::Split { left, right, .. } => {
                if left.iter().any(|d| d.id == *id) {
                    Some(Side::Left)
                } else if right.iter().any(|d| d.id == *id) {
                    Some(Side::Right)
                } else {
                    None
                }
            }
        }
    }

    // ── Device edits ─────────────────────────────────────────────────

    /// Add a device. `side` is required in split mode and ignored otherwise.
    pub fn add_device(
        &mut self,
        device: PlacedDevice,
        side: Option<Side>,
    ) -> Result<DeviceId, CoreError> {
        device.validate()?;
        if self.device(&device.id).is_some() {
            return Err(CoreError::DuplicateDevice(device.id));
        }
        let id = device.id;
        self.list_for(side)?.push(device);
        log::debug!("Added device {} ({} total)", id, self.device_count());
        Ok(id)
    }

    fn list_for(&mut self, side: Option<Side>) -> Result<&mut Vec<PlacedDevice>, CoreError> {
        match &mut self.layout {
            DeviceLayout::Single { devices } => Ok(devices),
            DeviceLayout::Split { left, right, .. } => match side {
                Some(Side::Left) => Ok(left),
                Some(Side::Right) => Ok(right),
                None => Err(CoreError::SideRequired),
            },
        }
    }

    pub fn move_device(&mut self, id: &DeviceId, offset_x: f64, offset_y: f64) -> Result<(), CoreError> {
        if !offset_x.is_finite() || !offset_y.is_finite() {
            return Err(CoreError::InvalidOffset {
                x: offset_x,
                y: offset_y,
            });
        }
        let device = self.device_mut(id)?;
        device.offset_x = offset_x;
        device.offset_y = offset_y;
        Ok(())
    }

    pub fn set_mount_type(&mut self, id: &DeviceId, mount_type: MountType) -> Result<(), CoreError> {
        self.device_mut(id)?.mount_type = mount_type;
        Ok(())
    }

    pub fn set_device_back_style(
        &mut self,
        id: &DeviceId,
        back_style: Option<BackStyle>,
    ) -> Result<(), CoreError> {
        self.device_mut(id)?.back_style = back_style;
        Ok(())
    }

    pub fn remove_device(&mut self, id: &DeviceId) -> Result<RemovedDevice, CoreError> {
        let side = self.side_of(id);
        let list = match &mut self.layout {
            DeviceLayout::Single { devices } => devices,
            DeviceLayout::Split { left, right, .. } => match side {
                Some(Side::Left) => left,
                Some(Side::Right) => right,
                None => return Err(CoreError::DeviceNotFound(*id)),
            },
        };
        let index = list
            .iter()
            .position(|d| d.id == *id)
            .ok_or(CoreError::DeviceNotFound(*id))?;
        let device = list.remove(index);
        Ok(RemovedDevice {
            device,
            side,
            index,
        })
    }

    /// Put a removed device back where it was.
    pub fn restore_device(&mut self, removed: RemovedDevice) -> Result<(), CoreError> {
        if self.device(&removed.device.id).is_some() {
            return Err(CoreError::DuplicateDevice(removed.device.id));
        }
        let list = self.list_for(removed.side.or(Some(Side::Left)))?;
        let index = removed.index.min(list.len());
        list.insert(index, removed.device);
        Ok(())
    }

    // ── Split mode ───────────────────────────────────────────────────

    /// Switch split mode on or off.
    ///
    /// Enabling partitions devices by center x against the split line;
    /// disabling joins the halves back into one list, left first. Enabling
    /// an already split panel only moves the line, as [`Self::set_split_offset`].
    pub fn set_split(&mut self, enabled: bool, offset: f64) -> Result<(), CoreError> {
        if enabled {
            check_split_offset(offset)?;
            if self.is_split() {
                return self.set_split_offset(offset);
            }
        }
        let layout = std::mem::take(&mut self.layout);
        self.layout = match (layout, enabled) {
            (DeviceLayout::Single { devices }, true) => {
                let (left, right) = devices.into_iter().partition(|d| d.offset_x < offset);
                DeviceLayout::Split {
                    split: SplitLine::new(offset),
                    left,
                    right,
                }
            }
            (DeviceLayout::Split { mut left, right, .. }, false) => {
                left.extend(right);
                DeviceLayout::Single { devices: left }
            }
            (layout, _) => layout,
        };
        Ok(())
    }

    pub fn set_split_offset(&mut self, offset: f64) -> Result<(), CoreError> {
        check_split_offset(offset)?;
        match &mut self.layout {
            DeviceLayout::Single { .. } => Err(CoreError::NotSplit),
            DeviceLayout::Split { split, .. } if split.locked => Err(CoreError::SplitLocked),
            DeviceLayout::Split { split, .. } => {
                split.offset = offset;
                Ok(())
            }
        }
    }

    pub fn set_split_locked(&mut self, locked: bool) -> Result<(), CoreError> {
        match &mut self.layout {
            DeviceLayout::Single { .. } => Err(CoreError::NotSplit),
            DeviceLayout::Split { split, .. } => {
                split.locked = locked;
                Ok(())
            }
        }
    }

    /// Check every invariant a loaded scene must satisfy.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.rack_u == 0 || self.rack_u > MAX_RACK_UNITS {
            return Err(CoreError::InvalidRackUnits(self.rack_u));
        }
        if let Some(split) = self.split_line() {
            check_split_offset(split.offset)?;
        }
        let mut seen = std::collections::HashSet::new();
        for device in self.devices() {
            device.validate()?;
            if !seen.insert(device.id) {
                return Err(CoreError::DuplicateDevice(device.id));
            }
        }
        Ok(())
    }
}

fn check_split_offset(offset: f64) -> Result<(), CoreError> {
    if offset.is_finite() {
        Ok(())
    } else {
        Err(CoreError::InvalidOffset { x: offset, y: 0.0 })
    }
}
