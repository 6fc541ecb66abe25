use serde::{Deserialize, Serialize};

use rackforge_core::rack::RACK_UNIT_MM;
use rackforge_core::RackWidth;

/// Smallest scale ever derived, so the inverse transform stays defined for
/// degenerate viewports.
const MIN_SCALE: f64 = 1e-9;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 20.0;

/// Snapshot of the faceplate canvas for one frame.
///
/// Immutable by convention: the builder methods return a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Canvas width in pixels.
    pub viewport_width: f64,
    /// Canvas height in pixels.
    pub viewport_height: f64,
    pub rack_u: u8,
    pub rack_width: RackWidth,
    /// Multiplier on top of the fit-to-viewport scale.
    pub zoom: f64,
    /// Pan of the panel center away from the canvas center, in pixels.
    pub pan_x: f64,
    pub pan_y: f64,
    /// Pixels kept free around the panel at zoom 1.
    pub padding: f64,
}

impl ViewConfig {
    pub fn new(viewport_width: f64, viewport_height: f64, rack_u: u8, rack_width: RackWidth) -> Self {
        Self {
            viewport_width,
            viewport_height,
            rack_u,
            rack_width,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            padding: 20.0,
        }
    }

    pub fn panel_width(&self) -> f64 {
        self.rack_width.panel_width()
    }

    pub fn panel_height(&self) -> f64 {
        self.rack_u.max(1) as f64 * RACK_UNIT_MM
    }

    /// Pixels per millimeter: fit-to-viewport times zoom.
    pub fn scale(&self) -> f64 {
        let avail_w = (self.viewport_width - 2.0 * self.padding).max(0.0);
        let avail_h = (self.viewport_height - 2.0 * self.padding).max(0.0);
        let fit = (avail_w / self.panel_width()).min(avail_h / self.panel_height());
        (fit * self.zoom).max(MIN_SCALE)
    }

    /// Same view with zoom multiplied by `factor`, keeping the physical point
    /// under (`px`, `py`) fixed on screen.
    pub fn zoomed_at(&self, px: f64, py: f64, factor: f64) -> Self {
        let (mm_x, mm_y) = to_physical(px, py, self);
        let mut next = *self;
        next.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);

        let (sx, sy) = to_view(mm_x, mm_y, &next);
        next.pan_x += px - sx;
        next.pan_y += py - sy;
        next
    }

    pub fn panned(&self, dx: f64, dy: f64) -> Self {
        Self {
            pan_x: self.pan_x + dx,
            pan_y: self.pan_y + dy,
            ..*self
        }
    }

    /// Back to fit-to-viewport.
    pub fn reset(&self) -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            ..*self
        }
    }
}

/// Physical mm (origin at panel center, Y up) to view pixels (origin top-left, Y down).
pub fn to_view(mm_x: f64, mm_y: f64, view: &ViewConfig) -> (f64, f64) {
    let s = view.scale();
    (
        view.viewport_width / 2.0 + view.pan_x + mm_x * s,
        view.viewport_height / 2.0 + view.pan_y - mm_y * s,
    )
}

/// Exact inverse of [`to_view`].
pub fn to_physical(px: f64, py: f64, view: &ViewConfig) -> (f64, f64) {
    let s = view.scale();
    (
        (px - view.viewport_width / 2.0 - view.pan_x) / s,
        (view.viewport_height / 2.0 + view.pan_y - py) / s,
    )
}

/// Size in mm to size in pixels.
pub fn scale(mm: f64, view: &ViewConfig) -> f64 {
    mm * view.scale()
}

/// Size in pixels to size in mm.
pub fn unscale(px: f64, view: &ViewConfig) -> f64 {
    px / view.scale()
}
