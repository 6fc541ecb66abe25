//! Built-in device catalog.
//!
//! Catalog ids are what the kernel-side panel library understands; the
//! dimensions here must match the library's models so that placement checks
//! agree with what actually gets printed.

use serde::Serialize;

use crate::device::Dimensions;

/// A known device model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl CatalogEntry {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height, self.depth)
    }
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry { id: "rpi4", name: "Raspberry Pi 4", width: 85.0, height: 24.0, depth: 56.0 },
    CatalogEntry { id: "rpi5", name: "Raspberry Pi 5", width: 85.0, height: 26.0, depth: 56.0 },
    CatalogEntry { id: "usw-flex-mini", name: "UniFi Switch Flex Mini", width: 107.16, height: 21.2, depth: 70.15 },
    CatalogEntry { id: "hex-s", name: "MikroTik hEX S", width: 113.0, height: 28.0, depth: 89.0 },
    CatalogEntry { id: "nuc11", name: "Intel NUC 11", width: 117.0, height: 38.0, depth: 112.0 },
    CatalogEntry { id: "optiplex-micro", name: "Dell OptiPlex Micro", width: 182.0, height: 36.0, depth: 178.0 },
    CatalogEntry { id: "hdd-35", name: "3.5\" Hard Drive", width: 101.6, height: 26.1, depth: 147.0 },
    CatalogEntry { id: "ssd-25", name: "2.5\" SSD", width: 69.85, height: 7.0, depth: 100.0 },
];

/// All catalog entries in display order.
pub fn entries() -> &'static [CatalogEntry] {
    CATALOG
}

/// Look up a catalog entry by id.
pub fn lookup(id: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.id == id)
}
