//! Hand-crafted color and texture descriptors.

use std::f32::consts::PI;

use image::RgbImage;

use crate::constants::{
    COLOR_HISTOGRAM_BINS, COLOR_HISTOGRAM_DIM, TEXTURE_GRID, TEXTURE_ORIENTATIONS,
};

/// Joint RGB histogram with `COLOR_HISTOGRAM_BINS` levels per channel, as pixel fractions.
pub fn color_histogram(rgb: &RgbImage) -> Vec<f32> {
    let mut hist = vec![0.0f32; COLOR_HISTOGRAM_DIM];
    let total = (rgb.width() * rgb.height()) as f32;
    if total == 0.0 {
        return hist;
    }

    let level = |v: u8| (v as usize * COLOR_HISTOGRAM_BINS) / 256;
    for pixel in rgb.pixels() {
        let bin = (level(pixel[0]) * COLOR_HISTOGRAM_BINS + level(pixel[1])) * COLOR_HISTOGRAM_BINS
            + level(pixel[2]);
        hist[bin] += 1.0;
    }
    for h in &mut hist {
        *h /= total;
    }
    hist
}

fn luminance(rgb: &RgbImage) -> Vec<f32> {
    rgb.pixels()
        .map(|p| (0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32) / 255.0)
        .collect()
}

/// Gradient-magnitude-weighted orientation histograms on a `TEXTURE_GRID` square grid.
///
/// Orientations are unsigned (`[0, pi)`); flat regions contribute nothing.
pub fn texture_descriptor(rgb: &RgbImage) -> Vec<f32> {
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let mut desc = vec![0.0f32; TEXTURE_GRID * TEXTURE_GRID * TEXTURE_ORIENTATIONS];
    if w < 3 || h < 3 {
        return desc;
    }

    let gray = luminance(rgb);
    let at = |x: usize, y: usize| gray[y * w + x];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = at(x + 1, y) - at(x - 1, y);
            let gy = at(x, y + 1) - at(x, y - 1);
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude <= f32::EPSILON {
                continue;
            }

            let mut angle = gy.atan2(gx);
            if angle < 0.0 {
                angle += PI;
            }
            let orientation =
                ((angle / PI * TEXTURE_ORIENTATIONS as f32) as usize).min(TEXTURE_ORIENTATIONS - 1);

            let cx = x * TEXTURE_GRID / w;
            let cy = y * TEXTURE_GRID / h;
            desc[(cy * TEXTURE_GRID + cx) * TEXTURE_ORIENTATIONS + orientation] += magnitude;
        }
    }
    desc
}
