use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};

use crate::device::{DeviceId, PlacedDevice};
use crate::geometry::{BBox, Point};

/// An entry in the R-tree spatial index, referencing a device by id.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub device_id: DeviceId,
    /// Position of the device in scene order; later devices draw on top.
    pub order: usize,
    /// Front-face footprint of the device.
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

impl PointDistance for SpatialEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope().distance_2(point)
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.envelope().contains_point(point)
    }
}

/// Spatial index over device footprints for hit-testing.
pub struct DeviceIndex {
    tree: RTree<SpatialEntry>,
}

impl DeviceIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Build the index from devices in scene order.
    pub fn build<'a>(devices: impl IntoIterator<Item = &'a PlacedDevice>) -> Self {
        let entries: Vec<SpatialEntry> = devices
            .into_iter()
            .enumerate()
            .filter_map(|(order, d)| {
                d.footprint().map(|bbox| SpatialEntry {
                    device_id: d.id,
                    order,
                    bbox,
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        self.tree.insert(entry);
    }

    /// Devices whose footprint contains the point, topmost first.
    pub fn query_point(&self, point: &Point) -> Vec<DeviceId> {
        let mut hits: Vec<&SpatialEntry> =
            self.tree.locate_all_at_point(&[point.x, point.y]).collect();
        hits.sort_by(|a, b| b.order.cmp(&a.order));
        hits.into_iter().map(|e| e.device_id).collect()
    }

    /// Devices whose footprint touches the given box (rubber-band selection).
    pub fn query_rect(&self, rect: &BBox) -> Vec<DeviceId> {
        let envelope = AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y]);
        let mut hits: Vec<&SpatialEntry> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .collect();
        hits.sort_by_key(|e| e.order);
        hits.into_iter().map(|e| e.device_id).collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for DeviceIndex {
    fn default() -> Self {
        Self::new()
    }
}
