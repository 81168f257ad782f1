//! Source image → device page rasters.
//!
//! ```text
//! decode → contrast → margin crop → [split → rotate 90° cw] → fit → dither → pad
//! ```
//!
//! Decoding and the two adjustments run once per source ([`decode_source`],
//! [`prepare`]); everything after that runs once per output page
//! ([`render_part`]), so a split spread can render its halves on different
//! workers from the same prepared page.
//!
//! Content is dithered before it is placed on the padded canvas, so padding
//! always holds exactly the fill value whatever the algorithm.

use super::adjust::{contrast_boost, crop, margin_crop_rect};
use super::calculations::{anchor_offset, calculate_fit_dimensions, split_rects};
use super::codec::{CodecError, decode_gray};
use super::dither::{DitherError, dither};
use super::params::{JobConfig, PagePart, ReadingOrder, Side, SplitAxis, TransformConfig};
use super::raster::{Depth, RasterBuffer};
use image::GrayImage;
use image::imageops::{self, FilterType};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    Geometry(String),
    #[error(transparent)]
    Dither(#[from] DitherError),
}

impl From<CodecError> for TransformError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) => TransformError::Io(io.to_string()),
            other => TransformError::Decode(other.to_string()),
        }
    }
}

/// Decode a source to 8-bit luma, rejecting zero-area images.
pub fn decode_source(path: &Path) -> Result<GrayImage, TransformError> {
    let img = decode_gray(path)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(TransformError::Geometry(format!(
            "{} has zero area ({}x{})",
            path.display(),
            img.width(),
            img.height()
        )));
    }
    Ok(img)
}

/// Apply the per-source adjustments: contrast boost, then margin crop.
pub fn prepare(img: &GrayImage, cfg: &TransformConfig) -> Result<GrayImage, TransformError> {
    let toned = match &cfg.contrast {
        Some(boost) => contrast_boost(img, boost),
        None => img.clone(),
    };
    let rect = margin_crop_rect(&toned, &cfg.margin);
    if rect.is_empty() {
        return Err(TransformError::Geometry(format!(
            "margin {} leaves nothing of a {}x{} page",
            cfg.margin,
            img.width(),
            img.height()
        )));
    }
    if rect.width == toned.width() && rect.height == toned.height() {
        return Ok(toned);
    }
    Ok(crop(&toned, rect))
}

/// Output pages for one source, in reading order. `None` is the whole page.
pub fn plan_parts(cfg: &TransformConfig) -> Vec<Option<PagePart>> {
    let sides = match (cfg.split, cfg.reading_order) {
        (None, _) => return vec![None],
        (Some(SplitAxis::Vertical), ReadingOrder::LeftToRight) => [Side::Left, Side::Right],
        (Some(SplitAxis::Vertical), ReadingOrder::RightToLeft) => [Side::Right, Side::Left],
        (Some(SplitAxis::Horizontal), _) => [Side::Top, Side::Bottom],
    };
    sides
        .into_iter()
        .zip(1u8..)
        .map(|(side, seq)| Some(PagePart { seq, side }))
        .collect()
}

/// Render one output page from a prepared source.
pub fn render_part(
    page: &GrayImage,
    part: Option<PagePart>,
    cfg: &JobConfig,
) -> Result<RasterBuffer, TransformError> {
    let Some(part) = part else {
        return fit_and_dither(page, cfg);
    };

    let (axis, index) = match part.side {
        Side::Left => (SplitAxis::Vertical, 0),
        Side::Right => (SplitAxis::Vertical, 1),
        Side::Top => (SplitAxis::Horizontal, 0),
        Side::Bottom => (SplitAxis::Horizontal, 1),
    };
    let rect = split_rects(page.width(), page.height(), axis)[index];
    if rect.is_empty() {
        return Err(TransformError::Geometry(format!(
            "{}x{} page is too small to split",
            page.width(),
            page.height()
        )));
    }
    let half = imageops::crop_imm(page, rect.x, rect.y, rect.width, rect.height).to_image();
    let half = imageops::rotate90(&half);
    fit_and_dither(&half, cfg)
}

/// Resize into the target, dither the content, then center it on the pad.
fn fit_and_dither(img: &GrayImage, cfg: &JobConfig) -> Result<RasterBuffer, TransformError> {
    let Some(target) = cfg.geometry.target else {
        let content = RasterBuffer::from_gray(img.clone());
        return Ok(dither(&content, cfg.dither, cfg.depth)?);
    };

    let (w, h) = calculate_fit_dimensions(img.dimensions(), (target.width, target.height));
    let resized = if (w, h) == img.dimensions() {
        img.clone()
    } else {
        imageops::resize(img, w, h, FilterType::Lanczos3)
    };
    let content = dither(&RasterBuffer::from_gray(resized), cfg.dither, Depth::Gray8)?;

    let padding = cfg.geometry.padding;
    let x0 = anchor_offset(w, target.width, padding.anchor) as usize;
    let y0 = anchor_offset(h, target.height, padding.anchor) as usize;
    let stride = target.width as usize;

    let mut canvas = vec![padding.color.value(); stride * target.height as usize];
    for (row, src) in content.as_bytes().chunks_exact(w as usize).enumerate() {
        let start = (y0 + row) * stride + x0;
        canvas[start..start + w as usize].copy_from_slice(src);
    }
    let page = RasterBuffer::from_gray_samples(target.width, target.height, canvas);

    Ok(match cfg.depth {
        Depth::Gray8 => page,
        Depth::Mono1 => page.to_mono(),
    })
}

/// Decode, adjust and render every output page of one source.
pub fn transform(path: &Path, cfg: &JobConfig) -> Result<Vec<RasterBuffer>, TransformError> {
    let page = prepare(&decode_source(path)?, &cfg.transform)?;
    plan_parts(&cfg.transform)
        .into_iter()
        .map(|part| render_part(&page, part, cfg))
        .collect()
}
