use image::imageops;
use image::DynamicImage;

use super::pixel::{encode_png, ImagingError};

/// Stand-in worker rendering: inverted grayscale of the submitted photo.
pub fn render_xray(photo: &[u8]) -> Result<Vec<u8>, ImagingError> {
    let decoded = image::load_from_memory(photo).map_err(ImagingError::Decode)?;
    let mut gray = imageops::grayscale(&decoded);
    imageops::invert(&mut gray);
    encode_png(&DynamicImage::ImageLuma8(gray).to_rgb8())
}
