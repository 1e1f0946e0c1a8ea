//! Clinic Media Vault - Image Encoding
//!
//! Fixed-quality JPEG compression for captured chart photos, decode for the
//! read path, and square gallery thumbnails.

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use std::io::Cursor;

/// Compress a captured photo to a fixed-quality JPEG buffer
///
/// The longest edge is clamped to `max_dimension` first so captures from
/// high-resolution sensors do not balloon storage.
pub fn compress_for_upload(
    img: &DynamicImage,
    quality: u8,
    max_dimension: u32,
) -> image::ImageResult<Vec<u8>> {
    let (width, height) = img.dimensions();

    let clamped = if width.max(height) > max_dimension {
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img.clone()
    };

    encode_jpeg(&clamped, quality)
}

/// Encode an image as JPEG at the given quality
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut output = Vec::new();
    let mut cursor = Cursor::new(&mut output);

    // JPEG carries no alpha channel
    let rgb = img.to_rgb8();

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder.encode_image(&rgb)?;

    Ok(output)
}

/// Decode plaintext bytes into a displayable image
pub fn decode_image(data: &[u8]) -> image::ImageResult<DynamicImage> {
    image::load_from_memory(data)
}

/// Center-cropped square thumbnail for the gallery grid
pub fn square_thumbnail(img: &DynamicImage, size: u32) -> DynamicImage {
    let (width, height) = img.dimensions();

    let (crop_x, crop_y, crop_size) = if width > height {
        let offset = (width - height) / 2;
        (offset, 0, height)
    } else {
        let offset = (height - width) / 2;
        (0, offset, width)
    };

    let cropped = img.crop_imm(crop_x, crop_y, crop_size, crop_size);
    cropped.resize_exact(size, size, FilterType::Lanczos3)
}
