//! Pure calculation functions for page geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{Anchor, Margin, SplitAxis};

/// A rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Largest size with the source aspect ratio that fits inside the target.
///
/// The scale is `min(tw/sw, th/sh)`; the constrained edge matches the target
/// exactly and the other is truncated, never below one pixel. Upscaling is allowed.
///
/// ```
/// # use inkpage::imaging::calculate_fit_dimensions;
/// // Landscape half of a 960x1400 page, rotated: 1400x480 → 480x164
/// assert_eq!(calculate_fit_dimensions((1400, 480), (480, 800)), (480, 164));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = (source.0 as u64, source.1 as u64);
    let (tw, th) = (target.0 as u64, target.1 as u64);

    // tw/sw <= th/sh, cross-multiplied to stay exact
    if tw * sh <= th * sw {
        let h = (sh * tw / sw).clamp(1, th);
        (target.0, h as u32)
    } else {
        let w = (sw * th / sh).clamp(1, tw);
        (w as u32, target.1)
    }
}

/// Offset of content of length `inner` on a canvas of length `outer`.
pub fn anchor_offset(inner: u32, outer: u32, anchor: Anchor) -> u32 {
    let slack = outer.saturating_sub(inner);
    match anchor {
        Anchor::Start => 0,
        Anchor::Center => slack / 2,
        Anchor::End => slack,
    }
}

/// The two halves of a page along `axis`, first half first.
///
/// With an odd extent the second half gets the extra row or column, so the
/// halves always tile the page exactly.
pub fn split_rects(width: u32, height: u32, axis: SplitAxis) -> [Rect; 2] {
    match axis {
        SplitAxis::Vertical => {
            let half = width / 2;
            [
                Rect {
                    x: 0,
                    y: 0,
                    width: half,
                    height,
                },
                Rect {
                    x: half,
                    y: 0,
                    width: width - half,
                    height,
                },
            ]
        }
        SplitAxis::Horizontal => {
            let half = height / 2;
            [
                Rect {
                    x: 0,
                    y: 0,
                    width,
                    height: half,
                },
                Rect {
                    x: 0,
                    y: half,
                    width,
                    height: height - half,
                },
            ]
        }
    }
}

/// Crop rectangle for a percentage margin. Each side removes
/// `int(percent / 100 × extent)` pixels. `Margin::Auto` is content dependent
/// and handled in `adjust`; here it, like `Margin::None`, yields the full frame.
pub fn margin_rect(width: u32, height: u32, margin: &Margin) -> Rect {
    match *margin {
        Margin::None | Margin::Auto => Rect::full(width, height),
        Margin::Percent {
            left,
            top,
            right,
            bottom,
        } => {
            let cut = |pct: f64, extent: u32| (pct / 100.0 * extent as f64) as u32;
            let x0 = cut(left, width);
            let y0 = cut(top, height);
            let x1 = width.saturating_sub(cut(right, width));
            let y1 = height.saturating_sub(cut(bottom, height));
            Rect {
                x: x0,
                y: y0,
                width: x1.saturating_sub(x0),
                height: y1.saturating_sub(y0),
            }
        }
    }
}
