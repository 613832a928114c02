use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage, RgbaImage};

/// Decode a blob into a 3-channel color buffer.
pub fn decode_color(bytes: &[u8]) -> Result<RgbImage, ImagingError> {
    let decoded = image::load_from_memory(bytes).map_err(ImagingError::Decode)?;
    Ok(decoded.to_rgb8())
}

/// Decode a blob into a 4-channel overlay buffer.
///
/// Sources without an alpha channel come back fully opaque.
pub fn decode_overlay(bytes: &[u8]) -> Result<RgbaImage, ImagingError> {
    let decoded = image::load_from_memory(bytes).map_err(ImagingError::Decode)?;
    Ok(decoded.to_rgba8())
}

/// Encode a color buffer as PNG.
pub fn encode_png(buffer: &RgbImage) -> Result<Vec<u8>, ImagingError> {
    let mut out = Cursor::new(Vec::new());
    buffer
        .write_to(&mut out, ImageFormat::Png)
        .map_err(ImagingError::Encode)?;
    Ok(out.into_inner())
}

/// Footprint of an overlay after a uniform `scale`, rounded to whole pixels.
///
/// Returns `None` when the scale is not a positive finite number or either
/// side rounds to less than one pixel.
pub fn scaled_dimensions(overlay: &RgbaImage, scale: f64) -> Option<(u32, u32)> {
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }
    let width = (f64::from(overlay.width()) * scale).round();
    let height = (f64::from(overlay.height()) * scale).round();
    if width < 1.0 || height < 1.0 || width > f64::from(u32::MAX) || height > f64::from(u32::MAX)
    {
        return None;
    }
    Some((width as u32, height as u32))
}

/// Resize an overlay to `(width, height)` with bilinear interpolation.
///
/// Callers size-check the target first; this allocates the full buffer.
pub fn resize_overlay(overlay: &RgbaImage, (width, height): (u32, u32)) -> RgbaImage {
    if (width, height) == overlay.dimensions() {
        return overlay.clone();
    }
    imageops::resize(overlay, width, height, FilterType::Triangle)
}

/// Extract the alpha channel of an overlay as a single-channel mask.
pub fn alpha_mask(overlay: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(overlay.width(), overlay.height(), |x, y| {
        Luma([overlay.get_pixel(x, y)[3]])
    })
}

/// Wrap a coordinate into `[0, extent)`; coordinates are cyclic.
pub fn wrap(coord: i64, extent: u32) -> i64 {
    if extent == 0 {
        return 0;
    }
    coord.rem_euclid(i64::from(extent))
}

/// Whether `(x, y)` addresses a pixel of `buffer`.
pub fn contains(buffer: &RgbImage, x: i64, y: i64) -> bool {
    x >= 0 && y >= 0 && x < i64::from(buffer.width()) && y < i64::from(buffer.height())
}

/// Mean channel intensity of a pixel.
pub fn intensity(pixel: &Rgb<u8>) -> f64 {
    pixel.0.iter().map(|&c| f64::from(c)).sum::<f64>() / 3.0
}

/// ITU-R BT.601 luma, rounded to the nearest integer.
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let value = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    value.round().clamp(0.0, 255.0) as u8
}

/// Pixel color as floating point channels, clamping the coordinate into the
/// buffer. The buffer must not be empty.
pub fn color_at_clamped(buffer: &RgbImage, x: u32, y: u32) -> [f64; 3] {
    let x = x.min(buffer.width().saturating_sub(1));
    let y = y.min(buffer.height().saturating_sub(1));
    to_color(buffer.get_pixel(x, y))
}

pub fn to_color(pixel: &Rgb<u8>) -> [f64; 3] {
    pixel.0.map(f64::from)
}

#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    #[error("Invalid image data: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),
}
