//! Synthetic images for review queue and compositing tests
#![allow(dead_code)]

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use xray_review::imaging::pixel::encode_png;
use xray_review::models::job::{JobMetadata, NewJob, OwnerRef};

/// Bone-gray square with a dark band through the middle, like a limb on film.
pub fn limb_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| {
        if y.abs_diff(height / 2) <= 1 {
            Rgb([40, 40, 40])
        } else {
            Rgb([180, 180, 180])
        }
    })
}

/// Fully opaque fracture stroke of the given size.
pub fn fracture_overlay(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if x.abs_diff(y) <= 1 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    encode_png(image).expect("PNG encoding failed")
}

pub fn overlay_png_bytes(overlay: &RgbaImage) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    overlay
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("PNG encoding failed");
    out.into_inner()
}

pub fn metadata(first_name: &str) -> JobMetadata {
    JobMetadata {
        first_name: first_name.to_string(),
        last_name: "Doe".to_string(),
        animal_name: "Teddy".to_string(),
        animal_type: "other".to_string(),
        broken_bone: false,
    }
}

/// Submission whose original image bytes spell out `tag`.
pub fn new_job(tag: &str, owner: OwnerRef) -> NewJob {
    NewJob {
        original_image: bytes::Bytes::from(tag.as_bytes().to_vec()),
        owner_ref: owner,
        metadata: metadata(tag),
    }
}
