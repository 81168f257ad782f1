//! In-memory page rasters.
//!
//! A [`RasterBuffer`] owns its samples outright. Every pipeline stage takes a
//! buffer by reference and returns a new one, so no two stages ever share
//! pixel storage.
//!
//! ## Layout
//!
//! | Depth | Bytes per row | Sample encoding |
//! |---|---|---|
//! | [`Depth::Gray8`] | `width` | 0 = black, 255 = white |
//! | [`Depth::Mono1`] | `ceil(width / 8)` | 1 bit per pixel, MSB = leftmost, 1 = white |
//!
//! Mono1 rows are padded to whole bytes; padding bits are always zero.

use image::{GrayImage, Luma};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RasterError {
    #[error("sample store holds {actual} bytes, expected {expected} for {width}x{height} {depth:?}")]
    StoreLength {
        width: u32,
        height: u32,
        depth: Depth,
        expected: usize,
        actual: usize,
    },
}

/// Sample depth of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// One byte per pixel, full grayscale.
    Gray8,
    /// One bit per pixel, packed MSB-first.
    Mono1,
}

impl Depth {
    /// Bytes needed for one row of `width` pixels.
    pub fn row_stride(self, width: u32) -> usize {
        match self {
            Depth::Gray8 => width as usize,
            Depth::Mono1 => (width as usize).div_ceil(8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    depth: Depth,
    data: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap an existing sample store, checking its length against the geometry.
    pub fn from_raw(
        width: u32,
        height: u32,
        depth: Depth,
        data: Vec<u8>,
    ) -> Result<Self, RasterError> {
        let expected = depth.row_stride(width) * height as usize;
        if data.len() != expected {
            return Err(RasterError::StoreLength {
                width,
                height,
                depth,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }

    /// A Gray8 raster where every sample is `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            depth: Depth::Gray8,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Gray8 raster from samples produced for exactly this geometry.
    pub(crate) fn from_gray_samples(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width,
            height,
            depth: Depth::Gray8,
            data,
        }
    }

    /// Take ownership of a decoded grayscale image.
    pub fn from_gray(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            depth: Depth::Gray8,
            data: img.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn row_stride(&self) -> usize {
        self.depth.row_stride(self.width)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Read the pixel at (x, y) as a grayscale value. Mono1 pixels read as 0 or 255.
    ///
    /// Panics if the coordinate is out of bounds.
    pub fn sample(&self, x: u32, y: u32) -> u8 {
        assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        match self.depth {
            Depth::Gray8 => self.data[y as usize * self.width as usize + x as usize],
            Depth::Mono1 => {
                let byte = self.data[y as usize * self.row_stride() + x as usize / 8];
                if byte & (0x80 >> (x % 8)) != 0 { 255 } else { 0 }
            }
        }
    }

    /// Pack a two-level Gray8 raster into Mono1. Samples >= 128 become white bits.
    pub fn to_mono(&self) -> RasterBuffer {
        if self.depth == Depth::Mono1 {
            return self.clone();
        }
        let stride = Depth::Mono1.row_stride(self.width);
        let mut packed = vec![0u8; stride * self.height as usize];
        for (y, row) in self.data.chunks_exact(self.width as usize).enumerate() {
            let out = &mut packed[y * stride..(y + 1) * stride];
            for (x, &v) in row.iter().enumerate() {
                if v >= 128 {
                    out[x / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        RasterBuffer {
            width: self.width,
            height: self.height,
            depth: Depth::Mono1,
            data: packed,
        }
    }

    /// Expand to an 8-bit image (Mono1 bits become 0 / 255) for encoding.
    pub fn to_gray_image(&self) -> GrayImage {
        match self.depth {
            Depth::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .unwrap_or_else(|| GrayImage::new(self.width, self.height)),
            Depth::Mono1 => {
                GrayImage::from_fn(self.width, self.height, |x, y| Luma([self.sample(x, y)]))
            }
        }
    }
}
