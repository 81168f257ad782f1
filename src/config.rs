//! Configuration: `inkpage.toml`, environment and stock defaults.
//!
//! Settings are layered, later layers winning:
//!
//! 1. stock defaults (see [`stock_config_toml`])
//! 2. `inkpage.toml` in the input directory, or the file given with `--config`
//! 3. environment (`INKPAGE_WORKERS`)
//! 4. command-line flags (applied by the CLI after loading)
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [manga]
//! split = true                  # Bisect every page
//! split_axis = "vertical"       # vertical = left/right halves, horizontal = top/bottom
//! reading_order = "left-to-right"  # or "right-to-left" (which half comes first)
//! dither = "floyd"              # none | floyd | ordered | rasterize
//! pad = "white"                 # white | black
//! contrast = "4"                # 0-8, or "dark,light"
//! margin = "0"                  # "auto", "P" or "L,T,R,B" (percent)
//! cleanup = false               # Remove .temp_png after encoding
//!
//! [bw]
//! dither = "floyd"
//! width = 480
//! height = 800
//! pad = "white"
//!
//! [processing]
//! workers = 4                   # Parallel page jobs
//!
//! [encoder]
//! # path = "/opt/epub2xtc"      # png2xtc.py or its folder
//! interpreter = "python3"
//! timeout_secs = 300
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [manga]
//! reading_order = "right-to-left"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    ContrastBoost, Dimensions, DitherAlgorithm, Margin, PadColor, ReadingOrder, SplitAxis,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the input directory.
pub const CONFIG_FILE: &str = "inkpage.toml";
/// Environment variable overriding `processing.workers`.
pub const ENV_WORKERS: &str = "INKPAGE_WORKERS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full configuration. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InkpageConfig {
    /// Manga/comic conversion.
    pub manga: MangaConfig,
    /// Background image conversion.
    pub bw: BwConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// External XTC encoder.
    pub encoder: EncoderConfig,
}

impl InkpageConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.manga.contrast_boost()?;
        self.manga.margin()?;
        if self.bw.width == 0 || self.bw.height == 0 {
            return Err(ConfigError::Validation(
                "bw.width and bw.height must be non-zero".into(),
            ));
        }
        if self.processing.workers == 0 {
            return Err(ConfigError::Validation(
                "processing.workers must be at least 1".into(),
            ));
        }
        if self.encoder.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "encoder.timeout_secs must be at least 1".into(),
            ));
        }
        if self.encoder.interpreter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "encoder.interpreter must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// `[manga]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MangaConfig {
    pub split: bool,
    pub split_axis: SplitAxis,
    pub reading_order: ReadingOrder,
    pub dither: DitherAlgorithm,
    pub pad: PadColor,
    /// Contrast level `N` or `D,L`; `"0"` disables.
    pub contrast: String,
    /// `auto`, `P` or `L,T,R,B`; `"0"` disables.
    pub margin: String,
    /// Delete the page scratch folder once all books are encoded.
    pub cleanup: bool,
}

impl Default for MangaConfig {
    fn default() -> Self {
        Self {
            split: true,
            split_axis: SplitAxis::Vertical,
            reading_order: ReadingOrder::LeftToRight,
            dither: DitherAlgorithm::Floyd,
            pad: PadColor::White,
            contrast: ContrastBoost::default().to_string(),
            margin: "0".to_string(),
            cleanup: false,
        }
    }
}

impl MangaConfig {
    /// Parsed contrast setting; `None` when both levels are zero.
    pub fn contrast_boost(&self) -> Result<Option<ContrastBoost>, ConfigError> {
        let boost: ContrastBoost = self
            .contrast
            .parse()
            .map_err(|e| ConfigError::Validation(format!("manga.contrast: {e}")))?;
        Ok((!boost.is_off()).then_some(boost))
    }

    pub fn margin(&self) -> Result<Margin, ConfigError> {
        self.margin
            .parse()
            .map_err(|e| ConfigError::Validation(format!("manga.margin: {e}")))
    }
}

/// `[bw]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BwConfig {
    pub dither: DitherAlgorithm,
    pub width: u32,
    pub height: u32,
    pub pad: PadColor,
}

impl Default for BwConfig {
    fn default() -> Self {
        Self {
            dither: DitherAlgorithm::Floyd,
            width: Dimensions::DEVICE.width,
            height: Dimensions::DEVICE.height,
            pad: PadColor::White,
        }
    }
}

impl BwConfig {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of page jobs run at once.
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Resolve the effective worker count: an explicit CLI value wins over config.
pub fn effective_threads(config: &ProcessingConfig, cli: Option<usize>) -> usize {
    cli.unwrap_or(config.workers).max(1)
}

/// `[encoder]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// `png2xtc.py` or a folder containing it. `PNG2XTC_PATH` wins over it;
    /// searched for when both are absent.
    pub path: Option<PathBuf>,
    pub interpreter: String,
    pub timeout_secs: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            path: None,
            interpreter: "python3".to_string(),
            timeout_secs: 300,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(InkpageConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<InkpageConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: InkpageConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `inkpage.toml` in the given directory (defaults if absent).
pub fn load_config(dir: &Path) -> Result<InkpageConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(&dir.join(CONFIG_FILE))?)
}

/// Load config from an explicit file, which must exist.
pub fn load_config_file(path: &Path) -> Result<InkpageConfig, ConfigError> {
    let overlay = load_raw_config(path)?.ok_or_else(|| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        ))
    })?;
    resolve_config(stock_defaults_value()?, Some(overlay))
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(
    config: &mut InkpageConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(ENV_WORKERS) {
        let workers: usize = raw
            .trim()
            .parse()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                ConfigError::Validation(format!("{ENV_WORKERS} must be a positive integer, got {raw:?}"))
            })?;
        config.processing.workers = workers;
    }
    Ok(())
}

/// Returns a fully-commented stock `inkpage.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# inkpage Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as inkpage.toml in the input directory, or pass it
# with --config. Command-line flags override everything in here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Manga / comic conversion (inkpage manga)
# ---------------------------------------------------------------------------
[manga]
# Bisect every page into two device pages, each rotated 90 degrees clockwise.
split = true

# "vertical" splits into left/right halves, "horizontal" into top/bottom.
split_axis = "vertical"

# Which half of a vertical split comes first: "left-to-right" or "right-to-left".
reading_order = "left-to-right"

# Dithering: "none" (threshold), "floyd", "ordered" (Bayer 8x8), "rasterize" (halftone).
dither = "floyd"

# Fill color around pages that don't match the screen aspect: "white" or "black".
pad = "white"

# Contrast boost level 0-8, or "dark,light" levels. "0" disables.
contrast = "4"

# Margin crop: "auto" trims whitespace, "P" crops P percent from every side,
# "L,T,R,B" crops per side. "0" disables.
margin = "0"

# Delete the .temp_png page folder after encoding.
cleanup = false

# ---------------------------------------------------------------------------
# Background images (inkpage bw)
# ---------------------------------------------------------------------------
[bw]
dither = "floyd"

# Output size in pixels (ignored with --keep-size).
width = 480
height = 800

pad = "white"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Parallel page jobs. INKPAGE_WORKERS and --workers override this.
workers = 4

# ---------------------------------------------------------------------------
# XTC encoder (png2xtc.py from epub2xtc)
# ---------------------------------------------------------------------------
[encoder]
# Path to png2xtc.py or the folder containing it. PNG2XTC_PATH overrides it.
# When neither is set, the folders around the inkpage executable are searched.
# path = "/opt/epub2xtc"

# Program used to run the script.
interpreter = "python3"

# Seconds before an encoding run is abandoned.
timeout_secs = 300
"##
}
