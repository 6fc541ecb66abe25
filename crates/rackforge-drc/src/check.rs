use std::collections::BTreeSet;

use rackforge_core::{BBox, DeviceId, PlacedDevice, Point, RackConfig, SplitLine};

use crate::violation::{PlacementViolation, ViolationKind};

/// Width of the no-placement band centered on the split line (mm).
pub const SPLIT_BAND_WIDTH_MM: f64 = 20.0;

/// A device with the footprint it is checked with.
struct Checked<'a> {
    device: &'a PlacedDevice,
    bbox: BBox,
}

/// Footprints used for checking. Walls only count once the panel is split,
/// because that is when the cages have to clear the joint hardware.
fn checked<'a>(
    devices: impl IntoIterator<Item = &'a PlacedDevice>,
    split_active: bool,
) -> Vec<Checked<'a>> {
    devices
        .into_iter()
        .filter_map(|device| {
            let bbox = if split_active {
                device.effective_footprint()
            } else {
                device.footprint()
            };
            match bbox {
                Some(bbox) => Some(Checked { device, bbox }),
                None => {
                    log::warn!("Skipping device {} with unresolved dimensions", device.id);
                    None
                }
            }
        })
        .collect()
}

/// The exclusion band as a box spanning the full panel height.
pub fn split_band(split: &SplitLine, panel_height: f64) -> BBox {
    BBox::from_center(
        Point::new(split.offset, 0.0),
        SPLIT_BAND_WIDTH_MM,
        panel_height,
    )
}

/// Whether a footprint crosses into the band. The band spans the whole
/// panel height so only the x extent matters; touching its edge is fine.
pub fn split_intrudes(bbox: &BBox, split: &SplitLine) -> bool {
    let half = SPLIT_BAND_WIDTH_MM / 2.0;
    bbox.min.x < split.offset + half && bbox.max.x > split.offset - half
}

/// Ids of every device that overlaps another device or intrudes into the
/// split band.
///
/// Pairwise O(n²); panels hold tens of devices. Pass `split` only when the
/// panel is in split mode.
pub fn find_violations<'a>(
    devices: impl IntoIterator<Item = &'a PlacedDevice>,
    split: Option<&SplitLine>,
) -> BTreeSet<DeviceId> {
    let items = checked(devices, split.is_some());
    let mut flagged = BTreeSet::new();

    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a.bbox.overlaps(&b.bbox) {
                flagged.insert(a.device.id);
                flagged.insert(b.device.id);
            }
        }
        if let Some(split) = split {
            if split_intrudes(&a.bbox, split) {
                flagged.insert(a.device.id);
            }
        }
    }
    flagged
}

/// Devices whose enclosure does not fit inside the usable panel area.
pub fn check_bounds(config: &RackConfig) -> Vec<PlacementViolation> {
    let area = config.usable_area();
    config
        .devices()
        .filter_map(|device| {
            let bbox = device.effective_footprint()?;
            if area.contains_bbox(&bbox) {
                return None;
            }
            Some(PlacementViolation::new(
                device.id,
                ViolationKind::OutOfBounds,
                format!("{} extends past the usable panel area", device.display_name()),
                bbox,
            ))
        })
        .collect()
}

/// Full advisory report for a scene, in scene order.
pub fn check_scene(config: &RackConfig) -> Vec<PlacementViolation> {
    let split = config.split_line();
    let items = checked(config.devices(), split.is_some());
    let mut violations = Vec::new();

    for (i, a) in items.iter().enumerate() {
        for (j, b) in items.iter().enumerate() {
            if i != j && a.bbox.overlaps(&b.bbox) {
                violations.push(PlacementViolation::new(
                    a.device.id,
                    ViolationKind::Overlap { other: b.device.id },
                    format!(
                        "{} overlaps {}",
                        a.device.display_name(),
                        b.device.display_name()
                    ),
                    a.bbox,
                ));
            }
        }
        if let Some(split) = split {
            if split_intrudes(&a.bbox, split) {
                violations.push(PlacementViolation::new(
                    a.device.id,
                    ViolationKind::SplitZone,
                    format!(
                        "{} is inside the split zone at x={}",
                        a.device.display_name(),
                        split.offset
                    ),
                    split_band(split, config.panel_height()),
                ));
            }
        }
    }

    violations.extend(check_bounds(config));
    if !violations.is_empty() {
        log::debug!("Placement check found {} violation(s)", violations.len());
    }
    violations
}
