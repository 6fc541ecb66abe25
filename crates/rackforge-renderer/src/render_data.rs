use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use rackforge_core::{BBox, DeviceId, DeviceIndex, Point, RackConfig};
use rackforge_drc::split_band;

use crate::view::{to_physical, to_view, ViewConfig};

/// A device rectangle ready for drawing, in canvas pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRect {
    pub device_id: DeviceId,
    pub label: String,
    /// [left, top, width, height] in pixels.
    pub rect: [f64; 4],
    /// Enclosure outline (footprint grown by the cage walls), same layout.
    pub enclosure: [f64; 4],
    /// Whether this device is currently selected.
    pub selected: bool,
    /// Whether this device has a placement violation.
    pub has_violation: bool,
}

/// Complete 2D frame of the faceplate canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelFrame {
    pub view: ViewConfig,
    /// Full panel face, ears included.
    pub panel: [f64; 4],
    /// Usable opening between the rails.
    pub usable: [f64; 4],
    pub split_band: Option<[f64; 4]>,
    pub devices: Vec<DeviceRect>,
    #[serde(skip)]
    index: Option<IndexHandle>,
}

/// Wrapper so the frame stays `Clone`/`Debug` while holding the R-tree.
#[derive(Clone)]
struct IndexHandle(std::sync::Arc<DeviceIndex>);

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceIndex({} entries)", self.0.len())
    }
}

/// Physical box to a pixel rect `[left, top, width, height]`.
fn pixel_rect(bbox: &BBox, view: &ViewConfig) -> [f64; 4] {
    let (left, top) = to_view(bbox.min.x, bbox.max.y, view);
    let (right, bottom) = to_view(bbox.max.x, bbox.min.y, view);
    [left, top, right - left, bottom - top]
}

impl PanelFrame {
    /// Lay out one frame. `violations` is the validator output for `config`.
    pub fn build(
        config: &RackConfig,
        view: &ViewConfig,
        violations: &BTreeSet<DeviceId>,
        selected: Option<DeviceId>,
    ) -> Self {
        let origin = Point::new(0.0, 0.0);
        let panel = BBox::from_center(origin, config.panel_width(), config.panel_height());

        let devices = config
            .devices()
            .filter_map(|d| {
                let footprint = d.footprint()?;
                let enclosure = footprint.expand(d.mount_type.wall_margin());
                Some(DeviceRect {
                    device_id: d.id,
                    label: d.display_name().to_string(),
                    rect: pixel_rect(&footprint, view),
                    enclosure: pixel_rect(&enclosure, view),
                    selected: selected == Some(d.id),
                    has_violation: violations.contains(&d.id),
                })
            })
            .collect::<Vec<_>>();
        log::trace!(
            "Built panel frame: {} devices, scale {:.4} px/mm",
            devices.len(),
            view.scale()
        );

        Self {
            view: *view,
            panel: pixel_rect(&panel, view),
            usable: pixel_rect(&config.usable_area(), view),
            split_band: config
                .split_line()
                .map(|s| pixel_rect(&split_band(s, config.panel_height()), view)),
            devices,
            index: Some(IndexHandle(std::sync::Arc::new(DeviceIndex::build(
                config.devices(),
            )))),
        }
    }

    /// Topmost device under a canvas position.
    pub fn device_at(&self, px: f64, py: f64) -> Option<DeviceId> {
        let (x, y) = to_physical(px, py, &self.view);
        let index = self.index.as_ref()?;
        index.0.query_point(&Point::new(x, y)).into_iter().next()
    }

    pub fn violation_count(&self) -> usize {
        self.devices.iter().filter(|d| d.has_violation).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackforge_core::{Dimensions, PlacedDevice, RackWidth};
    use rackforge_drc::find_violations;

    fn scene() -> (RackConfig, DeviceId, DeviceId) {
        let mut config = RackConfig::new(2).unwrap();
        let a = config
            .add_device(
                PlacedDevice::custom("a", Dimensions::new(100.0, 40.0, 50.0), -60.0, 0.0).unwrap(),
                None,
            )
            .unwrap();
        let b = config
            .add_device(
                PlacedDevice::custom("b", Dimensions::new(100.0, 40.0, 50.0), 20.0, 0.0).unwrap(),
                None,
            )
            .unwrap();
        (config, a, b)
    }

    #[test]
    fn test_frame_marks_violations() {
        let (config, a, b) = scene();
        let view = ViewConfig::new(1000.0, 300.0, config.rack_u, RackWidth::Inch19);
        let flagged = find_violations(config.devices(), config.split_line());
        let frame = PanelFrame::build(&config, &view, &flagged, Some(a));
        assert_eq!(frame.devices.len(), 2);
        assert_eq!(frame.violation_count(), 2);
        assert!(frame.devices[0].selected);
        assert!(!frame.devices[1].selected);
        assert_eq!(frame.devices[1].device_id, b);
        assert!(frame.split_band.is_none());
    }

    #[test]
    fn test_pixel_rect_is_positive() {
        let (config, _, _) = scene();
        let view = ViewConfig::new(1000.0, 300.0, config.rack_u, RackWidth::Inch19);
        let frame = PanelFrame::build(&config, &view, &BTreeSet::new(), None);
        for d in &frame.devices {
            assert!(d.rect[2] > 0.0 && d.rect[3] > 0.0);
            assert!(d.enclosure[2] > d.rect[2]);
        }
        let s = view.scale();
        assert!((frame.panel[2] - 482.6 * s).abs() < 1e-9);
    }

    #[test]
    fn test_device_at_picks_topmost() {
        let (config, a, b) = scene();
        let view = ViewConfig::new(1000.0, 300.0, config.rack_u, RackWidth::Inch19);
        let frame = PanelFrame::build(&config, &view, &BTreeSet::new(), None);

        let (px, py) = to_view(-100.0, 0.0, &view);
        assert_eq!(frame.device_at(px, py), Some(a));
        // Both cover x = -20; the later device is drawn on top.
        let (px, py) = to_view(-20.0, 0.0, &view);
        assert_eq!(frame.device_at(px, py), Some(b));
        let (px, py) = to_view(200.0, 0.0, &view);
        assert_eq!(frame.device_at(px, py), None);
    }

    #[test]
    fn test_split_band_present_in_split_mode() {
        let (mut config, _, _) = scene();
        config.set_split(true, 150.0).unwrap();
        let view = ViewConfig::new(1000.0, 300.0, config.rack_u, RackWidth::Inch19);
        let frame = PanelFrame::build(&config, &view, &BTreeSet::new(), None);
        let band = frame.split_band.unwrap();
        let s = view.scale();
        assert!((band[2] - rackforge_drc::SPLIT_BAND_WIDTH_MM * s).abs() < 1e-9);
    }

    #[test]
    fn test_frame_json_omits_index() {
        let (config, _, _) = scene();
        let view = ViewConfig::new(800.0, 200.0, config.rack_u, RackWidth::Inch19);
        let frame = PanelFrame::build(&config, &view, &BTreeSet::new(), None);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["devices"].as_array().unwrap().len(), 2);
        assert_eq!(value["devices"][0]["label"], "a");
        assert!(value.get("index").is_none());

        // A frame rebuilt from JSON has no hit-test index.
        let back: PanelFrame = serde_json::from_value(value).unwrap();
        assert_eq!(back.device_at(400.0, 100.0), None);
    }
}
