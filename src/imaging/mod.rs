//! Page imaging: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, BMP, GIF, TIFF, WebP) |
//! | **Contrast / margins** | custom histogram stretch + bounding box |
//! | **Split / rotate** | `image::imageops::crop_imm` + `rotate90` |
//! | **Resize** | Lanczos3 via `image::imageops::resize` |
//! | **Dither** | custom: threshold, Floyd–Steinberg, Bayer 8×8, 4×4 halftone |
//! | **Encode** | PNG via `image`, 1-bit BMP custom |
//!
//! The module is split into:
//! - **Raster**: [`RasterBuffer`] and its [`Depth`]
//! - **Calculations**: Pure functions for fit, anchor and split math (unit testable)
//! - **Parameters**: Data structures describing a page transform
//! - **Adjust**: Contrast boost and margin crop
//! - **Dither**: The [`dither`] engine
//! - **Codec**: Decoding sources, encoding pages
//! - **Transform**: The per-page pipeline combining all of the above

mod adjust;
mod calculations;
pub mod codec;
pub mod dither;
mod params;
pub mod raster;
pub mod transform;

pub use calculations::calculate_fit_dimensions;
pub use codec::{PageFormat, is_supported_image, supported_input_extensions};
pub use dither::{DitherError, dither};
pub use params::{
    Anchor, ContrastBoost, Dimensions, DitherAlgorithm, Geometry, JobConfig, Margin, PadColor,
    PageOverrides, Padding, PagePart, ParseParamError, ReadingOrder, Side, SplitAxis, TransformConfig,
};
pub use raster::{Depth, RasterBuffer};
pub use transform::{TransformError, decode_source, plan_parts, prepare, render_part, transform};
