//! Scene → kernel program serializer.
//!
//! The output is a keyword-argument call of one of the panel modules in the
//! kernel-side library:
//!
//! ```text
//! use <rackforge/panel.scad>;
//!
//! rack_panel(
//!     rack_u = 2,
//!     ...
//!     devices = [
//!         ["rpi5", -60, 0, "cage", "default"],
//!         ["custom", 80, 0, "tray", [90, 40, 120], "UPS", "vent"]
//!     ]
//! );
//! ```
//!
//! Output is a pure function of the scene: the scheduler relies on it for
//! no-op detection and exports must be reproducible.

use rackforge_core::{DeviceLayout, DeviceSource, PlacedDevice, RackConfig, Side};

/// Library file providing `rack_panel` and `split_rack_panel`.
pub const PANEL_LIBRARY: &str = "rackforge/panel.scad";

/// Per-device back style placeholder telling the kernel to use the panel style.
pub const DEFAULT_BACK_STYLE: &str = "default";

const INDENT: &str = "    ";

/// A literal in the program text.
#[derive(Debug, Clone, PartialEq)]
pub enum ScadValue {
    Number(f64),
    Str(String),
    Bool(bool),
    List(Vec<ScadValue>),
}

impl ScadValue {
    pub fn str(value: &str) -> Self {
        ScadValue::Str(value.to_string())
    }

    /// Render as program text.
    pub fn to_literal(&self) -> String {
        let mut out = String::new();
        self.write_literal(&mut out);
        out
    }

    fn write_literal(&self, out: &mut String) {
        match self {
            ScadValue::Number(v) => out.push_str(&format_number(*v)),
            ScadValue::Str(s) => out.push_str(&quote(s)),
            ScadValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            ScadValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_literal(out);
                }
                out.push(']');
            }
        }
    }
}

/// Shortest round-trip decimal, never in exponent form. `-0` becomes `0`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        // Validated scenes never hold non-finite numbers.
        log::error!("Non-finite number {} in scene, emitting 0", value);
        return "0".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

/// Double-quoted string literal with escapes.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn device_tuple(device: &PlacedDevice) -> ScadValue {
    let back = ScadValue::str(
        device
            .back_style
            .map(|b| b.as_str())
            .unwrap_or(DEFAULT_BACK_STYLE),
    );
    let mount = ScadValue::str(device.mount_type.as_str());
    let x = ScadValue::Number(device.offset_x);
    let y = ScadValue::Number(device.offset_y);
    match &device.source {
        DeviceSource::Catalog { id } => ScadValue::List(vec![ScadValue::str(id), x, y, mount, back]),
        DeviceSource::Custom { name, dimensions } => ScadValue::List(vec![
            ScadValue::str("custom"),
            x,
            y,
            mount,
            ScadValue::List(vec![
                ScadValue::Number(dimensions.width),
                ScadValue::Number(dimensions.height),
                ScadValue::Number(dimensions.depth),
            ]),
            ScadValue::str(name),
            back,
        ]),
    }
}

/// Builds one module call, one keyword argument per line.
struct CallWriter {
    module: &'static str,
    args: Vec<(&'static str, String)>,
}

impl CallWriter {
    fn new(module: &'static str) -> Self {
        Self {
            module,
            args: Vec::new(),
        }
    }

    fn arg(&mut self, name: &'static str, value: ScadValue) -> &mut Self {
        self.args.push((name, value.to_literal()));
        self
    }

    /// Device arrays get one tuple per line so diffs of exports stay readable.
    fn devices(&mut self, name: &'static str, devices: &[PlacedDevice]) -> &mut Self {
        let text = if devices.is_empty() {
            "[]".to_string()
        } else {
            let rows: Vec<String> = devices
                .iter()
                .map(|d| format!("{INDENT}{INDENT}{}", device_tuple(d).to_literal()))
                .collect();
            format!("[\n{}\n{INDENT}]", rows.join(",\n"))
        };
        self.args.push((name, text));
        self
    }

    fn finish(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("use <{}>;\n", PANEL_LIBRARY));
        out.push('\n');
        out.push_str(&format!("{}(\n", self.module));
        let last = self.args.len().saturating_sub(1);
        for (i, (name, value)) in self.args.iter().enumerate() {
            let sep = if i == last { "" } else { "," };
            out.push_str(&format!("{INDENT}{} = {}{}\n", name, value, sep));
        }
        out.push_str(");\n");
        out
    }
}

fn common_args(call: &mut CallWriter, config: &RackConfig) {
    call.arg("rack_u", ScadValue::Number(config.rack_u as f64))
        .arg("rack_width", ScadValue::str(config.rack_width.as_str()))
        .arg("ear_style", ScadValue::str(config.ear_style.as_str()))
        .arg("back_style", ScadValue::str(config.back_style.as_str()))
        .arg("vent_style", ScadValue::str(config.vent_style.as_str()))
        .arg("panel_thickness", ScadValue::Number(config.style.panel_thickness))
        .arg("corner_radius", ScadValue::Number(config.style.corner_radius))
        .arg("ear_width", ScadValue::Number(config.style.ear_width))
        .arg("vent_size", ScadValue::Number(config.style.vent_size))
        .arg("vent_spacing", ScadValue::Number(config.style.vent_spacing));
}

fn render(config: &RackConfig, side: Option<Side>) -> String {
    match &config.layout {
        DeviceLayout::Single { devices } => {
            let mut call = CallWriter::new("rack_panel");
            common_args(&mut call, config);
            call.devices("devices", devices);
            call.finish()
        }
        DeviceLayout::Split { split, left, right } => {
            let mut call = CallWriter::new("split_rack_panel");
            common_args(&mut call, config);
            call.arg("split_offset", ScadValue::Number(split.offset))
                .arg(
                    "render_side",
                    ScadValue::str(side.map(|s| s.as_str()).unwrap_or("both")),
                )
                .devices("left_devices", left)
                .devices("right_devices", right);
            call.finish()
        }
    }
}

/// Program for the whole panel (both halves when split).
pub fn serialize(config: &RackConfig) -> String {
    render(config, None)
}

/// Program for one half of a split panel, for printing halves separately.
/// A panel that is not split has no halves, so the whole panel is emitted.
pub fn serialize_side(config: &RackConfig, side: Side) -> String {
    if !config.is_split() {
        log::warn!("Per-side export of a single panel; emitting the full panel");
        return render(config, None);
    }
    render(config, Some(side))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackforge_core::{BackStyle, Dimensions, MountType};

    fn scene() -> RackConfig {
        let mut config = RackConfig::new(2).unwrap();
        config
            .add_device(PlacedDevice::from_catalog("rpi5", -60.0, 0.0).unwrap(), None)
            .unwrap();
        config
            .add_device(
                PlacedDevice::custom("UPS", Dimensions::new(90.0, 40.0, 120.5), 80.0, -2.25)
                    .unwrap()
                    .with_mount_type(MountType::Tray)
                    .with_back_style(Some(BackStyle::Solid)),
                None,
            )
            .unwrap();
        config
    }

    #[test]
    fn test_single_panel_program() {
        let expected = "\
use <rackforge/panel.scad>;

rack_panel(
    rack_u = 2,
    rack_width = \"19in\",
    ear_style = \"standard\",
    back_style = \"vent\",
    vent_style = \"slots\",
    panel_thickness = 4,
    corner_radius = 2,
    ear_width = 16.3,
    vent_size = 6,
    vent_spacing = 2.5,
    devices = [
        [\"rpi5\", -60, 0, \"cage\", \"default\"],
        [\"custom\", 80, -2.25, \"tray\", [90, 40, 120.5], \"UPS\", \"solid\"]
    ]
);
";
        assert_eq!(serialize(&scene()), expected);
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let config = scene();
        assert_eq!(serialize(&config), serialize(&config));
        assert_eq!(serialize(&config), serialize(&config.clone()));
    }

    #[test]
    fn test_ids_and_camera_do_not_change_output() {
        let a = scene();
        let mut b = a.clone();
        b.camera = Some(rackforge_core::CameraState {
            azimuth: 1.0,
            elevation: 2.0,
            distance: 3.0,
        });
        if let DeviceLayout::Single { devices } = &mut b.layout {
            devices[0].id = uuid::Uuid::new_v4();
        }
        assert_eq!(serialize(&a), serialize(&b));
    }

    #[test]
    fn test_split_program_has_both_lists() {
        let mut config = scene();
        config.set_split(true, 10.0).unwrap();
        let program = serialize(&config);
        assert!(program.contains("split_rack_panel("));
        assert!(program.contains("    split_offset = 10,\n"));
        assert!(program.contains("    render_side = \"both\",\n"));
        assert!(program.contains("    left_devices = [\n        [\"rpi5\""));
        assert!(program.contains("    right_devices = [\n        [\"custom\""));
        assert!(!program.contains("    devices ="));

        let left = serialize_side(&config, Side::Left);
        assert!(left.contains("render_side = \"left\""));
        let right = serialize_side(&config, Side::Right);
        assert!(right.contains("render_side = \"right\""));
    }

    #[test]
    fn test_empty_lists() {
        let mut config = RackConfig::new(1).unwrap();
        assert!(serialize(&config).contains("    devices = []\n);"));
        config.set_split(true, 0.0).unwrap();
        let program = serialize(&config);
        assert!(program.contains("left_devices = [],"));
        assert!(program.contains("right_devices = []\n"));
    }

    #[test]
    fn test_literals() {
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(1e21), "1000000000000000000000");
        assert_eq!(format_number(f64::NAN), "0");
        assert_eq!(quote("My \"box\"\\2"), "\"My \\\"box\\\"\\\\2\"");
        assert_eq!(ScadValue::Bool(true).to_literal(), "true");
        assert_eq!(
            ScadValue::List(vec![ScadValue::Bool(false), ScadValue::Number(1.5)]).to_literal(),
            "[false, 1.5]"
        );
    }
}
