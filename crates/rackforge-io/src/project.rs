use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use rackforge_core::{
    BackStyle, CameraState, CoreError, DeviceLayout, DeviceSource, Dimensions, EarStyle,
    MountType, PlacedDevice, RackConfig, RackWidth, SplitLine, StyleParams, VentStyle,
};

/// Current scene document version.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed scene document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported scene document version {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid scene document: {0}")]
    InvalidDocument(String),

    #[error("Invalid scene: {0}")]
    Scene(#[from] CoreError),
}

/// Inline dimensions of a custom device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomDevice {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

/// One device entry of the scene document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomDevice>,
    pub offset_x: f64,
    pub offset_y: f64,
    pub mount_type: MountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_style: Option<BackStyle>,
}

impl DeviceEntry {
    fn from_device(device: &PlacedDevice) -> Self {
        let (catalog_id, custom) = match &device.source {
            DeviceSource::Catalog { id } => (Some(id.clone()), None),
            DeviceSource::Custom { name, dimensions } => (
                None,
                Some(CustomDevice {
                    name: name.clone(),
                    width: dimensions.width,
                    height: dimensions.height,
                    depth: dimensions.depth,
                }),
            ),
        };
        Self {
            id: device.id,
            catalog_id,
            custom,
            offset_x: device.offset_x,
            offset_y: device.offset_y,
            mount_type: device.mount_type,
            back_style: device.back_style,
        }
    }

    fn into_device(self) -> Result<PlacedDevice, ProjectError> {
        let source = match (self.catalog_id, self.custom) {
            (Some(id), None) => DeviceSource::Catalog { id },
            (None, Some(c)) => DeviceSource::Custom {
                name: c.name,
                dimensions: Dimensions::new(c.width, c.height, c.depth),
            },
            _ => {
                return Err(ProjectError::InvalidDocument(format!(
                    "device {} needs exactly one of catalogId or custom",
                    self.id
                )))
            }
        };
        Ok(PlacedDevice {
            id: self.id,
            source,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            mount_type: self.mount_type,
            back_style: self.back_style,
        })
    }
}

fn entries(devices: &[PlacedDevice]) -> Vec<DeviceEntry> {
    devices.iter().map(DeviceEntry::from_device).collect()
}

fn devices(entries: Vec<DeviceEntry>) -> Result<Vec<PlacedDevice>, ProjectError> {
    entries.into_iter().map(DeviceEntry::into_device).collect()
}

/// The persisted scene: a flat keyed document mirroring `RackConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    pub version: u32,
    pub rack_u: u8,
    #[serde(default)]
    pub rack_width: RackWidth,
    pub ear_style: EarStyle,
    pub back_style: BackStyle,
    pub vent_style: VentStyle,
    #[serde(default)]
    pub style_params: StyleParams,
    #[serde(default)]
    pub is_split: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_offset: Option<f64>,
    #[serde(default)]
    pub split_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<DeviceEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_devices: Option<Vec<DeviceEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_devices: Option<Vec<DeviceEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraState>,
}

impl SceneDocument {
    pub fn from_config(config: &RackConfig) -> Self {
        let mut doc = Self {
            version: DOCUMENT_VERSION,
            rack_u: config.rack_u,
            rack_width: config.rack_width,
            ear_style: config.ear_style,
            back_style: config.back_style,
            vent_style: config.vent_style,
            style_params: config.style,
            is_split: false,
            split_offset: None,
            split_locked: false,
            devices: None,
            left_devices: None,
            right_devices: None,
            camera: config.camera,
        };
        match &config.layout {
            DeviceLayout::Single { devices } => {
                doc.devices = Some(entries(devices));
            }
            DeviceLayout::Split { split, left, right } => {
                doc.is_split = true;
                doc.split_offset = Some(split.offset);
                doc.split_locked = split.locked;
                doc.left_devices = Some(entries(left));
                doc.right_devices = Some(entries(right));
            }
        }
        doc
    }

    /// Convert to a scene, enforcing the single/split list invariant and
    /// every scene invariant.
    pub fn into_config(self) -> Result<RackConfig, ProjectError> {
        if self.version > DOCUMENT_VERSION {
            return Err(ProjectError::UnsupportedVersion(self.version));
        }
        let layout = if self.is_split {
            if self.devices.is_some() {
                return Err(ProjectError::InvalidDocument(
                    "split document must use leftDevices/rightDevices, not devices".into(),
                ));
            }
            let offset = self.split_offset.unwrap_or(0.0);
            if !offset.is_finite() {
                return Err(ProjectError::InvalidDocument("splitOffset must be finite".into()));
            }
            DeviceLayout::Split {
                split: SplitLine {
                    offset,
                    locked: self.split_locked,
                },
                left: devices(self.left_devices.unwrap_or_default())?,
                right: devices(self.right_devices.unwrap_or_default())?,
            }
        } else {
            if self.left_devices.is_some() || self.right_devices.is_some() {
                return Err(ProjectError::InvalidDocument(
                    "leftDevices/rightDevices require isSplit".into(),
                ));
            }
            DeviceLayout::Single {
                devices: devices(self.devices.unwrap_or_default())?,
            }
        };

        let config = RackConfig {
            rack_u: self.rack_u,
            rack_width: self.rack_width,
            ear_style: self.ear_style,
            back_style: self.back_style,
            vent_style: self.vent_style,
            style: self.style_params,
            layout,
            camera: self.camera,
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Serialization ────────────────────────────────────────────────────

pub fn to_json(config: &RackConfig) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(&SceneDocument::from_config(config))?)
}

pub fn from_json(json: &str) -> Result<RackConfig, ProjectError> {
    let doc: SceneDocument = serde_json::from_str(json)?;
    doc.into_config()
}

pub fn save(path: impl AsRef<Path>, config: &RackConfig) -> Result<(), ProjectError> {
    let path = path.as_ref();
    std::fs::write(path, to_json(config)?)?;
    log::info!("Saved scene to {}", path.display());
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<RackConfig, ProjectError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let config = from_json(&json)?;
    log::info!(
        "Loaded scene from {} ({} devices)",
        path.display(),
        config.device_count()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scad;
    use proptest::prelude::*;
    use rackforge_core::Side;

    fn scene() -> RackConfig {
        let mut config = RackConfig::new(3).unwrap();
        config
            .add_device(PlacedDevice::from_catalog("nuc11", -120.0, 10.0).unwrap(), None)
            .unwrap();
        config
            .add_device(
                PlacedDevice::custom("Modem", Dimensions::new(60.0, 30.0, 90.0), 100.0, -5.5)
                    .unwrap()
                    .with_back_style(Some(BackStyle::Honeycomb)),
                None,
            )
            .unwrap();
        config
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let mut config = scene();
        config.set_split(true, 0.0).unwrap();
        config.set_split_locked(true).unwrap();
        save(&path, &config).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_document_field_names() {
        let json = to_json(&scene()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rackU"], 3);
        assert_eq!(value["isSplit"], false);
        assert_eq!(value["devices"][0]["catalogId"], "nuc11");
        assert_eq!(value["devices"][0]["mountType"], "cage");
        assert_eq!(value["devices"][1]["custom"]["width"], 60.0);
        assert_eq!(value["devices"][1]["backStyle"], "honeycomb");
        assert!(value.get("leftDevices").is_none());
        assert_eq!(value["styleParams"]["panelThickness"], 4.0);
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = r#"{"version":1,"rackU":1,"earStyle":"standard","backStyle":"vent","ventStyle":"slots",
            "devices":[{"id":"7b0c1f4e-0a36-4c1e-9d35-3a6f0c8e2b11","catalogId":"rpi4","offsetX":0,"offsetY":0,"mountType":"cage"}]}"#;
        let b = r#"{"devices":[{"mountType":"cage","offsetY":0,"offsetX":0,"catalogId":"rpi4","id":"7b0c1f4e-0a36-4c1e-9d35-3a6f0c8e2b11"}],
            "ventStyle":"slots","backStyle":"vent","earStyle":"standard","rackU":1,"version":1}"#;
        let a = from_json(a).unwrap();
        let b = from_json(b).unwrap();
        assert_eq!(scad::serialize(&a), scad::serialize(&b));
    }

    #[test]
    fn test_rejects_mixed_lists() {
        let mut doc = SceneDocument::from_config(&scene());
        doc.left_devices = Some(Vec::new());
        assert!(matches!(doc.into_config(), Err(ProjectError::InvalidDocument(_))));

        let mut config = scene();
        config.set_split(true, 0.0).unwrap();
        let mut doc = SceneDocument::from_config(&config);
        doc.devices = Some(Vec::new());
        assert!(matches!(doc.into_config(), Err(ProjectError::InvalidDocument(_))));
    }

    #[test]
    fn test_rejects_unknown_catalog_and_bad_dimensions() {
        let mut doc = SceneDocument::from_config(&scene());
        if let Some(devices) = doc.devices.as_mut() {
            devices[0].catalog_id = Some("toaster".into());
        }
        assert!(matches!(
            doc.into_config(),
            Err(ProjectError::Scene(CoreError::UnknownCatalogId(_)))
        ));

        let mut doc = SceneDocument::from_config(&scene());
        if let Some(devices) = doc.devices.as_mut() {
            devices[1].custom.as_mut().unwrap().depth = -1.0;
        }
        assert!(matches!(
            doc.into_config(),
            Err(ProjectError::Scene(CoreError::InvalidDimensions { .. }))
        ));
    }

    #[test]
    fn test_split_sides_survive_reload() {
        let mut config = scene();
        config.set_split(true, 0.0).unwrap();
        let reloaded = from_json(&to_json(&config).unwrap()).unwrap();
        let ids: Vec<_> = config.devices().map(|d| d.id).collect();
        assert_eq!(reloaded.side_of(&ids[0]), Some(Side::Left));
        assert_eq!(reloaded.side_of(&ids[1]), Some(Side::Right));
        assert_eq!(
            scad::serialize_side(&config, Side::Left),
            scad::serialize_side(&reloaded, Side::Left)
        );
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut doc = SceneDocument::from_config(&scene());
        doc.version = DOCUMENT_VERSION + 1;
        assert!(matches!(doc.into_config(), Err(ProjectError::UnsupportedVersion(_))));
    }

    proptest! {
        #[test]
        fn prop_reload_keeps_exact_offsets(
            x in -200.0f64..200.0,
            y in -40.0f64..40.0,
            split in -100.0f64..100.0,
        ) {
            let mut config = RackConfig::new(2).unwrap();
            config
                .add_device(PlacedDevice::from_catalog("rpi4", x, y).unwrap(), None)
                .unwrap();
            let reloaded = from_json(&to_json(&config).unwrap()).unwrap();
            prop_assert_eq!(&reloaded, &config);
            prop_assert_eq!(reloaded.snapshot_hash(), config.snapshot_hash());

            config.set_split(true, split).unwrap();
            let reloaded = from_json(&to_json(&config).unwrap()).unwrap();
            prop_assert_eq!(&reloaded, &config);
        }
    }
}
