//! Shared test utilities for the inkpage test suite.
//!
//! Provides synthetic rasters and on-disk fixtures so tests never depend on
//! checked-in image files.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let book = make_book(tmp.path(), "Vol 1", &[(960, 1400), (800, 1200)]);
//! let pages = list_files(&book);
//! assert_eq!(pages.len(), 2);
//! ```

use crate::imaging::RasterBuffer;
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::path::{Path, PathBuf};

// =========================================================================
// In-memory rasters
// =========================================================================

/// Gray8 raster built from a per-pixel function.
pub fn raster_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> RasterBuffer {
    RasterBuffer::from_gray(GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)])))
}

/// Diagonal gradient covering the full 0–255 range.
pub fn gradient_raster(width: u32, height: u32) -> RasterBuffer {
    let span = (width + height).saturating_sub(2).max(1);
    raster_from_fn(width, height, |x, y| ((x + y) * 255 / span) as u8)
}

// =========================================================================
// On-disk fixtures
// =========================================================================

/// Write a synthetic RGB page: white background with a dark block in the middle.
/// The format follows the file extension.
pub fn write_page(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        let inside = x > width / 4 && x < width * 3 / 4 && y > height / 4 && y < height * 3 / 4;
        if inside {
            Rgb([30, 30, 30])
        } else {
            Rgb([250, 250, 250])
        }
    });
    img.save(path).unwrap();
}

/// Create a book directory with numbered PNG pages of the given sizes.
pub fn make_book(root: &Path, name: &str, sizes: &[(u32, u32)]) -> PathBuf {
    let book = root.join(name);
    for (i, &(w, h)) in sizes.iter().enumerate() {
        write_page(&book.join(format!("page{:03}.png", i + 1)), w, h);
    }
    book
}

/// Regular files directly under `dir`, sorted by name.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
