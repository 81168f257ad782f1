//! Grayscale to two-level dithering.
//!
//! Every algorithm maps a [`Depth::Gray8`] raster to one holding only black
//! and white, either as Gray8 samples of 0/255 or packed [`Depth::Mono1`].
//! All of them are pure and deterministic; none spawn threads.
//!
//! | Algorithm | Kind | Notes |
//! |---|---|---|
//! | `none` | threshold | `v >= 128` is white. Idempotent. |
//! | `floyd` | error diffusion | Floyd–Steinberg, strict raster order |
//! | `ordered` | ordered | 8×8 Bayer matrix, pixel-local |
//! | `rasterize` | halftone | 4×4 clustered dots grown from the cell center |
//!
//! ## Floyd–Steinberg
//!
//! ```text
//!        X   7
//!    3   5   1      (/16)
//! ```
//!
//! Shares are integer divisions of the error; the below-right share takes
//! the remainder so nothing is lost to rounding. Shares that would land
//! outside the image are dropped.

use super::params::DitherAlgorithm;
use super::raster::{Depth, RasterBuffer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DitherError {
    #[error("dithering needs an 8-bit grayscale raster, got {0:?}")]
    UnsupportedDepth(Depth),
}

/// Classic 8×8 Bayer threshold matrix (values 0–63).
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Order in which pixels of a 4×4 halftone cell turn black, center first.
const CLUSTER4: [[u8; 4]; 4] = [
    [12, 5, 6, 13],
    [4, 0, 1, 7],
    [11, 3, 2, 8],
    [15, 10, 9, 14],
];

const CELL: u32 = 4;

/// Dither a Gray8 raster into a two-level raster of depth `target`.
pub fn dither(
    buffer: &RasterBuffer,
    algorithm: DitherAlgorithm,
    target: Depth,
) -> Result<RasterBuffer, DitherError> {
    if buffer.depth() != Depth::Gray8 {
        return Err(DitherError::UnsupportedDepth(buffer.depth()));
    }
    let (width, height) = buffer.dimensions();
    let samples = buffer.as_bytes();

    let levels = match algorithm {
        DitherAlgorithm::None => threshold(samples),
        DitherAlgorithm::Floyd => floyd_steinberg(samples, width as usize, height as usize),
        DitherAlgorithm::Ordered => ordered(samples, width as usize),
        DitherAlgorithm::Rasterize => rasterize(samples, width, height),
    };

    let gray = RasterBuffer::from_gray_samples(width, height, levels);
    Ok(match target {
        Depth::Gray8 => gray,
        Depth::Mono1 => gray.to_mono(),
    })
}

fn quantize(v: i32) -> u8 {
    if v >= 128 { 255 } else { 0 }
}

fn threshold(samples: &[u8]) -> Vec<u8> {
    samples.iter().map(|&v| quantize(v as i32)).collect()
}

fn floyd_steinberg(samples: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut acc: Vec<i32> = samples.iter().map(|&v| v as i32).collect();
    let mut out = vec![0u8; samples.len()];

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let old = acc[i];
            let new = quantize(old);
            out[i] = new;

            let err = old - new as i32;
            if err == 0 {
                continue;
            }
            let e7 = err * 7 / 16;
            let e3 = err * 3 / 16;
            let e5 = err * 5 / 16;
            let e1 = err - e7 - e3 - e5;

            if x + 1 < width {
                acc[i + 1] += e7;
            }
            if y + 1 < height {
                let below = i + width;
                if x > 0 {
                    acc[below - 1] += e3;
                }
                acc[below] += e5;
                if x + 1 < width {
                    acc[below + 1] += e1;
                }
            }
        }
    }
    out
}

fn ordered(samples: &[u8], width: usize) -> Vec<u8> {
    samples
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let (x, y) = (i % width, i / width);
            let t = (BAYER8[y & 7][x & 7] as f32 + 0.5) * 255.0 / 64.0;
            if v as f32 > t { 255 } else { 0 }
        })
        .collect()
}

fn rasterize(samples: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut out = vec![255u8; samples.len()];
    let w = width as usize;

    for cy in (0..height).step_by(CELL as usize) {
        for cx in (0..width).step_by(CELL as usize) {
            let cw = CELL.min(width - cx);
            let ch = CELL.min(height - cy);

            // In-bounds cell pixels ordered by cluster rank
            let mut cell: Vec<(u8, usize)> = Vec::with_capacity((cw * ch) as usize);
            let mut sum = 0u32;
            for dy in 0..ch {
                for dx in 0..cw {
                    let i = (cy + dy) as usize * w + (cx + dx) as usize;
                    sum += samples[i] as u32;
                    cell.push((CLUSTER4[dy as usize][dx as usize], i));
                }
            }
            cell.sort_unstable_by_key(|&(rank, _)| rank);

            let n = cell.len() as f64;
            let darkness = 255.0 - sum as f64 / n;
            let black = (darkness / 255.0 * n).round() as usize;
            for &(_, i) in cell.iter().take(black) {
                out[i] = 0;
            }
        }
    }
    out
}
