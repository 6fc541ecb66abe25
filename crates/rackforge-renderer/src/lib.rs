//! # Rackforge Renderer
//!
//! Coordinate transform between physical panel millimeters and canvas
//! pixels, and the per-frame 2D render data (device rectangles, split band,
//! violation highlighting) that the faceplate canvas consumes.
//!
//! The 3D preview is not drawn here; it comes from the kernel as a mesh.

pub mod render_data;
pub mod view;

pub use render_data::{DeviceRect, PanelFrame};
pub use view::{scale, to_physical, to_view, unscale, ViewConfig};
