//! Parameter types for page transforms.
//!
//! These types describe *what* to do to a page, not *how*. They are built once
//! per run from the resolved configuration and shared read-only by every job.
//!
//! ## Types
//!
//! - [`DitherAlgorithm`]: `none`, `floyd`, `ordered` or `rasterize`.
//! - [`Geometry`]: optional target size plus [`Padding`] (fill color and anchor).
//! - [`SplitAxis`] / [`ReadingOrder`]: how a page is bisected and which half comes first.
//! - [`PagePart`]: one half of a split page: sequence number plus [`Side`].
//! - [`ContrastBoost`]: dark/light autocontrast levels (0–8).
//! - [`Margin`]: crop before splitting: none, automatic whitespace trim, or percentages.
//! - [`TransformConfig`] / [`JobConfig`]: the full per-run snapshot a job reads.
//! - [`PageOverrides`]: per-page exceptions to that snapshot.

use super::raster::Depth;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A parse failure for any of the textual parameter forms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseParamError(pub String);

// ============================================================================
// Dithering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DitherAlgorithm {
    /// Plain threshold at mid-gray.
    None,
    /// Floyd–Steinberg error diffusion.
    Floyd,
    /// 8×8 Bayer ordered dither.
    Ordered,
    /// 4×4 clustered-dot halftone.
    Rasterize,
}

impl DitherAlgorithm {
    pub const ALL: [DitherAlgorithm; 4] = [
        DitherAlgorithm::None,
        DitherAlgorithm::Floyd,
        DitherAlgorithm::Ordered,
        DitherAlgorithm::Rasterize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DitherAlgorithm::None => "none",
            DitherAlgorithm::Floyd => "floyd",
            DitherAlgorithm::Ordered => "ordered",
            DitherAlgorithm::Rasterize => "rasterize",
        }
    }
}

impl fmt::Display for DitherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DitherAlgorithm {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DitherAlgorithm::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ParseParamError(format!(
                    "unknown dither algorithm '{s}' (expected none, floyd, ordered or rasterize)"
                ))
            })
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// The XTEink X4 panel in portrait orientation.
    pub const DEVICE: Dimensions = Dimensions {
        width: 480,
        height: 800,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadColor {
    #[default]
    White,
    Black,
}

impl PadColor {
    pub fn value(self) -> u8 {
        match self {
            PadColor::White => 255,
            PadColor::Black => 0,
        }
    }
}

/// Where resized content sits on the padded canvas, on the axis that has slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    #[default]
    Center,
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub color: PadColor,
    pub anchor: Anchor,
}

/// Target size for output pages. `None` keeps the source dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub target: Option<Dimensions>,
    pub padding: Padding,
}

impl Geometry {
    pub fn device() -> Self {
        Self {
            target: Some(Dimensions::DEVICE),
            padding: Padding::default(),
        }
    }

    pub fn pass_through() -> Self {
        Self::default()
    }
}

// ============================================================================
// Splitting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitAxis {
    /// Left and right column halves.
    #[default]
    Vertical,
    /// Top and bottom row halves.
    Horizontal,
}

impl FromStr for SplitAxis {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(SplitAxis::Vertical),
            "horizontal" => Ok(SplitAxis::Horizontal),
            _ => Err(ParseParamError(format!(
                "unknown split axis '{s}' (expected vertical or horizontal)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingOrder {
    #[default]
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    pub fn letter(self) -> char {
        match self {
            Side::Left => 'l',
            Side::Right => 'r',
            Side::Top => 't',
            Side::Bottom => 'b',
        }
    }
}

/// One half of a split page. `seq` is 1-based in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PagePart {
    pub seq: u8,
    pub side: Side,
}

impl fmt::Display for PagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.seq, self.side.letter())
    }
}

// ============================================================================
// Adjustments
// ============================================================================

/// Autocontrast strength as separate dark and light levels, each 0–8.
///
/// Level `n` clips `3n` percent of the darkest pixels and `3 + 9n` percent of
/// the lightest. Both levels at zero disables the boost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContrastBoost {
    pub dark: u8,
    pub light: u8,
}

impl ContrastBoost {
    pub const MAX_LEVEL: u8 = 8;

    pub fn level(n: u8) -> Self {
        Self { dark: n, light: n }
    }

    pub fn is_off(&self) -> bool {
        self.dark == 0 && self.light == 0
    }

    /// Histogram cutoffs as (dark %, light %).
    pub fn cutoffs(&self) -> (f64, f64) {
        (3.0 * self.dark as f64, 3.0 + 9.0 * self.light as f64)
    }
}

impl Default for ContrastBoost {
    fn default() -> Self {
        Self::level(4)
    }
}

impl FromStr for ContrastBoost {
    type Err = ParseParamError;

    /// Accepts `N` or `D,L`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_level = |v: &str| -> Result<u8, ParseParamError> {
            let n: u8 = v
                .trim()
                .parse()
                .map_err(|_| ParseParamError(format!("invalid contrast level '{v}'")))?;
            if n > Self::MAX_LEVEL {
                return Err(ParseParamError(format!(
                    "contrast level {n} out of range 0-{}",
                    Self::MAX_LEVEL
                )));
            }
            Ok(n)
        };
        match s.split_once(',') {
            Some((d, l)) => Ok(Self {
                dark: parse_level(d)?,
                light: parse_level(l)?,
            }),
            None => Ok(Self::level(parse_level(s)?)),
        }
    }
}

impl fmt::Display for ContrastBoost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dark == self.light {
            write!(f, "{}", self.dark)
        } else {
            write!(f, "{},{}", self.dark, self.light)
        }
    }
}

/// Margin crop applied before splitting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Margin {
    #[default]
    None,
    /// Trim surrounding whitespace.
    Auto,
    /// Percent of width (left/right) and height (top/bottom) removed per side.
    Percent {
        left: f64,
        top: f64,
        right: f64,
        bottom: f64,
    },
}

impl FromStr for Margin {
    type Err = ParseParamError;

    /// Accepts `auto`, `P` or `L,T,R,B`. Missing trailing sides are 0; `0` is no crop.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Margin::Auto);
        }
        let values = s
            .split(',')
            .map(|v| {
                let p: f64 = v
                    .trim()
                    .parse()
                    .map_err(|_| ParseParamError(format!("invalid margin percent '{v}'")))?;
                if !(0.0..50.0).contains(&p) {
                    return Err(ParseParamError(format!(
                        "margin percent {p} out of range 0-50"
                    )));
                }
                Ok(p)
            })
            .collect::<Result<Vec<f64>, _>>()?;
        let margin = match values.as_slice() {
            [p] => Margin::Percent {
                left: *p,
                top: *p,
                right: *p,
                bottom: *p,
            },
            [rest @ ..] if rest.len() <= 4 => {
                let side = |i: usize| rest.get(i).copied().unwrap_or(0.0);
                Margin::Percent {
                    left: side(0),
                    top: side(1),
                    right: side(2),
                    bottom: side(3),
                }
            }
            _ => {
                return Err(ParseParamError(format!(
                    "margin '{s}' has more than four values"
                )));
            }
        };
        match margin {
            Margin::Percent {
                left,
                top,
                right,
                bottom,
            } if left == 0.0 && top == 0.0 && right == 0.0 && bottom == 0.0 => Ok(Margin::None),
            m => Ok(m),
        }
    }
}

impl fmt::Display for Margin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Margin::None => f.write_str("0"),
            Margin::Auto => f.write_str("auto"),
            Margin::Percent {
                left,
                top,
                right,
                bottom,
            } => write!(f, "{left},{top},{right},{bottom}"),
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Decode-side adjustments and splitting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformConfig {
    /// `Some(axis)` bisects every page along that axis.
    pub split: Option<SplitAxis>,
    pub reading_order: ReadingOrder,
    pub contrast: Option<ContrastBoost>,
    pub margin: Margin,
}

/// Exceptions to the run-wide transform for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageOverrides {
    /// Render the page whole even when the run splits pages (covers, splash pages).
    pub keep_whole: bool,
    /// Replaces the run-wide contrast boost.
    pub contrast: Option<ContrastBoost>,
}

impl PageOverrides {
    pub fn is_empty(&self) -> bool {
        !self.keep_whole && self.contrast.is_none()
    }

    /// The run-wide transform with these exceptions applied.
    pub fn apply(&self, base: &TransformConfig) -> TransformConfig {
        TransformConfig {
            split: if self.keep_whole { None } else { base.split },
            contrast: self.contrast.or(base.contrast),
            ..*base
        }
    }
}

/// Everything a job needs to turn a source into output rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobConfig {
    pub transform: TransformConfig,
    pub dither: DitherAlgorithm,
    pub geometry: Geometry,
    pub depth: Depth,
}
