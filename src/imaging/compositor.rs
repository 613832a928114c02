//! Fracture overlay compositing.
//!
//! A fracture graphic (RGBA, alpha = blend weight) is painted onto a base
//! image with a synthetic color gradient sampled from the surrounding tissue,
//! restricted to bone-colored pixels and roughened with Gaussian noise.

use std::f64::consts::TAU;

use image::{GrayImage, Rgb, RgbImage, RgbaImage};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::pixel::{
    alpha_mask, color_at_clamped, contains, intensity, luma, resize_overlay, scaled_dimensions,
    to_color, wrap,
};

/// Anchor pixels must be darker than this mean intensity.
pub const GRAY_THRESHOLD: f64 = 120.0;

/// Inclusive grayscale range treated as bone.
pub const BONE_LOWER: u8 = 90;
pub const BONE_UPPER: u8 = 255;

const ANGLE_SAMPLES: u32 = 64;
const EPSILON: f64 = 1e-6;

const FALLBACK_PRIMARY: (u32, u32) = (50, 50);
const FALLBACK_SECONDARY: (u32, u32) = (1, 1);
const FALLBACK_DIRECTION: (i64, i64) = (1, 0);

/// Placement of a fracture overlay on a base image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractureParams {
    pub x: i64,
    pub y: i64,
    /// Uniform resize factor applied to the overlay before placement.
    pub scale: f64,
    /// Standard deviation of the additive Gaussian noise.
    pub noise_std: f64,
}

/// Gradient endpoints sampled from the base image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientAnchors {
    pub color1: [f64; 3],
    pub color2: [f64; 3],
    pub direction: (i64, i64),
}

/// Composite `overlay` onto `base` at `(x, y)`.
///
/// The placement is checked on the raw coordinates: a resized overlay that
/// starts left of or above the image, or that would extend past the right or
/// bottom edge, leaves `base` untouched. Output dimensions always equal the
/// input dimensions.
pub fn apply_fracture<R: Rng + ?Sized>(
    mut base: RgbImage,
    overlay: &RgbaImage,
    params: &FractureParams,
    rng: &mut R,
) -> RgbImage {
    let Some(footprint) = scaled_dimensions(overlay, params.scale) else {
        tracing::debug!(scale = params.scale, "Overlay scale yields an empty footprint");
        return base;
    };

    // Checked before resizing so an oversized scale never allocates.
    if !placement_fits(&base, footprint, params.x, params.y) {
        tracing::debug!(
            x = params.x,
            y = params.y,
            width = footprint.0,
            height = footprint.1,
            "Overlay placement outside image bounds, skipping"
        );
        return base;
    }

    let resized = resize_overlay(overlay, footprint);
    let mask = alpha_mask(&resized);
    let anchors = sample_gradient_anchors(&base, &mask, params.x, params.y);
    blend_overlay(
        &mut base,
        params.x,
        params.y,
        &resized,
        &anchors,
        params.noise_std,
        rng,
    );
    base
}

fn placement_fits(base: &RgbImage, (width, height): (u32, u32), x: i64, y: i64) -> bool {
    x >= 0
        && y >= 0
        && x + i64::from(width) <= i64::from(base.width())
        && y + i64::from(height) <= i64::from(base.height())
}

/// Locate two dark tissue pixels around the overlay center and the direction
/// between them.
///
/// `(x, y)` is wrapped into the image before searching. The first anchor is
/// searched on rings of growing radius (64 angular samples each); the second
/// anchor is searched along the mirrored direction and must fall on an
/// opaque overlay pixel.
pub fn sample_gradient_anchors(
    base: &RgbImage,
    alpha: &GrayImage,
    x: i64,
    y: i64,
) -> GradientAnchors {
    if base.width() == 0 || base.height() == 0 {
        return GradientAnchors {
            color1: [0.0; 3],
            color2: [0.0; 3],
            direction: FALLBACK_DIRECTION,
        };
    }

    let x = wrap(x, base.width());
    let y = wrap(y, base.height());
    let (w, h) = alpha.dimensions();
    let center_x = x + i64::from(w / 2);
    let center_y = y + i64::from(h / 2);
    let max_radius = i64::from(w.max(h) / 2);

    let is_dark = |sx: i64, sy: i64| {
        contains(base, sx, sy) && intensity(base.get_pixel(sx as u32, sy as u32)) < GRAY_THRESHOLD
    };

    let mut first = None;
    'rings: for r in 1..max_radius {
        for step in 0..ANGLE_SAMPLES {
            // Both ends of the circle are sampled, like an inclusive linspace.
            let angle = TAU * f64::from(step) / f64::from(ANGLE_SAMPLES - 1);
            let dx = (r as f64 * angle.cos()).round_ties_even() as i64;
            let dy = (r as f64 * angle.sin()).round_ties_even() as i64;
            let (sx, sy) = (center_x + dx, center_y + dy);
            if is_dark(sx, sy) {
                first = Some(((sx, sy), (dx, dy)));
                break 'rings;
            }
        }
    }

    let Some((anchor1, direction)) = first else {
        return GradientAnchors {
            color1: color_at_clamped(base, FALLBACK_PRIMARY.0, FALLBACK_PRIMARY.1),
            color2: color_at_clamped(base, FALLBACK_SECONDARY.0, FALLBACK_SECONDARY.1),
            direction: FALLBACK_DIRECTION,
        };
    };

    let anchor2 = (1..max_radius).find_map(|r| {
        let sx = center_x - direction.0 * r;
        let sy = center_y - direction.1 * r;
        let (mask_x, mask_y) = (sx - x, sy - y);
        let inside_mask =
            mask_x >= 0 && mask_y >= 0 && mask_x < i64::from(w) && mask_y < i64::from(h);
        (inside_mask
            && is_dark(sx, sy)
            && alpha.get_pixel(mask_x as u32, mask_y as u32)[0] > 0)
            .then_some((sx, sy))
    });

    let color1 = to_color(base.get_pixel(anchor1.0 as u32, anchor1.1 as u32));
    match anchor2 {
        None => GradientAnchors {
            color1,
            color2: color_at_clamped(base, FALLBACK_SECONDARY.0, FALLBACK_SECONDARY.1),
            direction,
        },
        Some(anchor2) => GradientAnchors {
            color1,
            color2: to_color(base.get_pixel(anchor2.0 as u32, anchor2.1 as u32)),
            direction: (anchor2.0 - anchor1.0, anchor2.1 - anchor1.1),
        },
    }
}

/// Blend the gradient-colored overlay into `base` in place.
///
/// `(x, y)` is wrapped into the image and the overlay is clipped to the image
/// bounds; an empty clip leaves `base` untouched. Pixels outside the clipped
/// region are never written.
pub fn blend_overlay<R: Rng + ?Sized>(
    base: &mut RgbImage,
    x: i64,
    y: i64,
    overlay: &RgbaImage,
    anchors: &GradientAnchors,
    noise_std: f64,
    rng: &mut R,
) {
    let (width, height) = base.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let start_x = wrap(x, width) as u32;
    let start_y = wrap(y, height) as u32;
    let region_w = overlay.width().min(width - start_x);
    let region_h = overlay.height().min(height - start_y);
    if region_w == 0 || region_h == 0 {
        return;
    }

    let bone = bone_mask(base, start_x, start_y, region_w, region_h);
    let gradient = gradient_region(overlay, region_w, region_h, anchors);
    let mut noisy = gradient;
    add_gaussian_noise(&mut noisy, noise_std, rng);

    for ly in 0..region_h {
        for lx in 0..region_w {
            let alpha = f64::from(overlay.get_pixel(lx, ly)[3]) / 255.0;
            let weight = alpha * bone[(ly * region_w + lx) as usize];
            let target = base.get_pixel_mut(start_x + lx, start_y + ly);
            let source = noisy.get_pixel(lx, ly);
            for c in 0..3 {
                let blended =
                    (1.0 - weight) * f64::from(target[c]) + weight * f64::from(source[c]);
                target[c] = blended.clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Bone pixels of the destination region, grown by a 3x3 dilation.
fn bone_mask(base: &RgbImage, start_x: u32, start_y: u32, w: u32, h: u32) -> Vec<f64> {
    let raw: Vec<bool> = (0..h)
        .flat_map(|ly| (0..w).map(move |lx| (lx, ly)))
        .map(|(lx, ly)| {
            let value = luma(base.get_pixel(start_x + lx, start_y + ly));
            (BONE_LOWER..=BONE_UPPER).contains(&value)
        })
        .collect();

    let (w, h) = (w as i64, h as i64);
    let mut dilated = vec![0.0; raw.len()];
    for ly in 0..h {
        for lx in 0..w {
            let hit = (-1..=1).any(|oy| {
                (-1..=1).any(|ox| {
                    let (nx, ny) = (lx + ox, ly + oy);
                    nx >= 0 && ny >= 0 && nx < w && ny < h && raw[(ny * w + nx) as usize]
                })
            });
            if hit {
                dilated[(ly * w + lx) as usize] = 1.0;
            }
        }
    }
    dilated
}

/// Linear color ramp across the overlay along the anchor direction.
fn gradient_region(
    overlay: &RgbaImage,
    w: u32,
    h: u32,
    anchors: &GradientAnchors,
) -> RgbImage {
    let (dx, dy) = match anchors.direction {
        (0, 0) => (1.0, 0.0),
        (dx, dy) => (dx as f64, dy as f64),
    };
    let norm = dx.hypot(dy) + EPSILON;
    let (gx, gy) = (dx / norm, dy / norm);
    let (half_w, half_h) = (f64::from(w / 2), f64::from(h / 2));

    let projection =
        |lx: u32, ly: u32| (f64::from(lx) - half_w) * gx + (f64::from(ly) - half_h) * gy;

    let mut range: Option<(f64, f64)> = None;
    for ly in 0..h {
        for lx in 0..w {
            if overlay.get_pixel(lx, ly)[3] > 0 {
                let p = projection(lx, ly);
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(p), hi.max(p)),
                    None => (p, p),
                });
            }
        }
    }
    let (min_proj, max_proj) = range.unwrap_or((0.0, 1.0));
    let span = max_proj - min_proj + EPSILON;

    RgbImage::from_fn(w, h, |lx, ly| {
        let t = ((projection(lx, ly) - min_proj) / span).clamp(0.0, 1.0);
        let mut px = [0u8; 3];
        for (c, out) in px.iter_mut().enumerate() {
            let value = (1.0 - t) * anchors.color1[c] + t * anchors.color2[c];
            *out = value.clamp(0.0, 255.0) as u8;
        }
        Rgb(px)
    })
}

/// Add zero-mean Gaussian noise to every channel, saturating at 0 and 255.
pub fn add_gaussian_noise<R: Rng + ?Sized>(buffer: &mut RgbImage, std: f64, rng: &mut R) {
    if !std.is_finite() || std <= 0.0 {
        return;
    }
    let Ok(normal) = Normal::new(0.0, std) else {
        return;
    };
    for px in buffer.pixels_mut() {
        for channel in px.0.iter_mut() {
            let noise = normal.sample(rng) as i32;
            *channel = (i32::from(*channel) + noise).clamp(0, 255) as u8;
        }
    }
}
