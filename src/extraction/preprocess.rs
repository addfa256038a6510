//! Decode and normalize raw image bytes into the fixed model input.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};

use crate::constants::{CHANNEL_MEAN, CHANNEL_STD, MAX_IMAGE_EDGE, MIN_IMAGE_EDGE};

use super::error::{ExtractionError, ExtractionResult};

/// Square RGB crop plus its normalized CHW tensor data.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub rgb: RgbImage,
    /// `3 * size * size` floats, channel-major, mean/std normalized.
    pub chw: Vec<f32>,
    pub size: u32,
}

/// Decodes `bytes` and checks the source dimensions.
pub fn decode(bytes: &[u8]) -> ExtractionResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(ExtractionError::UnreadableImage {
            reason: "empty payload".to_string(),
        });
    }
    let image = image::load_from_memory(bytes).map_err(|e| ExtractionError::UnreadableImage {
        reason: e.to_string(),
    })?;

    let (width, height) = image.dimensions();
    let edge_ok = |e: u32| (MIN_IMAGE_EDGE..=MAX_IMAGE_EDGE).contains(&e);
    if !edge_ok(width) || !edge_ok(height) {
        return Err(ExtractionError::UnsupportedFormat { width, height });
    }
    Ok(image)
}

/// Shortest-edge resize to `size`, center crop, then per-channel normalization.
pub fn prepare(image: &DynamicImage, size: u32) -> PreparedImage {
    let rgb = image.resize_to_fill(size, size, FilterType::Triangle).to_rgb8();

    let plane = (size * size) as usize;
    let mut chw = vec![0.0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            chw[c * plane + i] = (pixel[c] as f32 / 255.0 - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
        }
    }

    PreparedImage { rgb, chw, size }
}
