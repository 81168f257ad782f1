//! Tone and margin adjustments applied once per decoded page.
//!
//! Both run on the full page before it is split, so the two halves of a
//! spread always share the same tone curve and crop.

use super::calculations::{Rect, margin_rect};
use super::params::{ContrastBoost, Margin};
use image::GrayImage;
use image::imageops;

/// Histogram stretch with percentage cutoffs at each end.
///
/// `low` percent of the pixels are removed from the dark end of the histogram
/// and `high` percent from the light end; the remaining range is mapped
/// linearly onto 0–255. A flat remainder leaves the image unchanged.
pub fn autocontrast(img: &GrayImage, low: f64, high: f64) -> GrayImage {
    let mut hist = [0f64; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1.0;
    }
    let n = (img.width() as f64) * (img.height() as f64);

    trim(&mut hist, (n * low / 100.0).floor(), 0..256);
    trim(&mut hist, (n * high / 100.0).floor(), (0..256).rev());

    let lo = (0..256).find(|&i| hist[i] > 0.0);
    let hi = (0..256).rev().find(|&i| hist[i] > 0.0);
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => (lo as i32, hi as i32),
        _ => return img.clone(),
    };

    let lut: Vec<u8> = (0..256i32)
        .map(|i| ((i - lo) * 255 / (hi - lo)).clamp(0, 255) as u8)
        .collect();

    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
    out
}

/// Remove `cut` pixels from the histogram, walking bins in `order`.
fn trim(hist: &mut [f64; 256], mut cut: f64, order: impl Iterator<Item = usize>) {
    for i in order {
        if cut <= 0.0 {
            break;
        }
        if cut > hist[i] {
            cut -= hist[i];
            hist[i] = 0.0;
        } else {
            hist[i] -= cut;
            cut = 0.0;
        }
    }
}

pub fn contrast_boost(img: &GrayImage, boost: &ContrastBoost) -> GrayImage {
    if boost.is_off() {
        return img.clone();
    }
    let (dark, light) = boost.cutoffs();
    autocontrast(img, dark, light)
}

/// Bounding box of the page content, ignoring near-white surroundings.
///
/// The page is inverted and stretched hard (59 % dark, 40 % light cutoff) so
/// that paper tone and scan noise collapse to zero; the box covers every
/// pixel still above zero. A page with no content yields the full frame.
pub fn content_bounds(img: &GrayImage) -> Rect {
    let mut inverted = img.clone();
    imageops::invert(&mut inverted);
    let stretched = autocontrast(&inverted, 59.0, 40.0);

    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0u32, 0u32);
    for (x, y, p) in stretched.enumerate_pixels() {
        if p.0[0] != 0 {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x + 1);
            y1 = y1.max(y + 1);
        }
    }
    if x0 == u32::MAX {
        return Rect::full(img.width(), img.height());
    }
    Rect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

/// Rectangle kept by a margin setting.
pub fn margin_crop_rect(img: &GrayImage, margin: &Margin) -> Rect {
    match margin {
        Margin::Auto => content_bounds(img),
        _ => margin_rect(img.width(), img.height(), margin),
    }
}

pub fn crop(img: &GrayImage, rect: Rect) -> GrayImage {
    imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}
