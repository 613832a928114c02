//! Pixel buffers and the fracture compositing algorithm.
//!
//! Base images are handled as 3-channel [`image::RgbImage`] buffers and
//! overlays as 4-channel [`image::RgbaImage`] buffers whose alpha channel is
//! the blend weight. Coordinates follow the `image` crate convention:
//! `x` is the column, `y` the row, origin at the top-left.

pub mod compositor;
pub mod pixel;
pub mod preview;

pub use compositor::{apply_fracture, FractureParams, GradientAnchors};
pub use pixel::ImagingError;
