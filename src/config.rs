//! Analysis options.
//!
//! Handles loading, validating, and merging `config.toml` files. Options are
//! layered: stock defaults are overridden by an optional config file, which is
//! in turn overridden by command-line flags. The merged result is validated
//! once before a run starts and is read-only afterwards.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [quality]
//! jpg = 85                  # JPEG re-encode quality (1-100)
//! webp = 82                 # Lossy WebP quality (1-100)
//! avif = 64                 # AVIF quality (1-100)
//! gif = 3                   # GIF optimisation level (1-3)
//! png_effort = 2            # Lossless PNG optimisation preset (0-6)
//!
//! [output]
//! remove_buffers_from_transforms = true
//!
//! [thresholds]
//! min_savings_ratio = 0.1   # Saving that makes a smaller variant worth flagging
//! max_display_density = 3.0 # Image pixels per CSS pixel before it is excessive
//! sizes_tolerance = 0.05    # Allowed mismatch between `sizes` and display width
//!
//! [processing]
//! max_threads = 4           # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [quality]
//! webp = 75
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{ImageFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Options for one analysis run.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Encoder settings for the transforms.
    pub quality: QualityConfig,
    /// Shape of the final report.
    pub output: OutputConfig,
    /// Offender thresholds.
    pub thresholds: ThresholdsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Options {
    /// Validate option values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let q = &self.quality;
        for (name, value) in [("jpg", q.jpg), ("webp", q.webp), ("avif", q.avif)] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "quality.{name} must be 1-100"
                )));
            }
        }
        if !(1..=3).contains(&q.gif) {
            return Err(ConfigError::Validation("quality.gif must be 1-3".into()));
        }
        if q.png_effort > 6 {
            return Err(ConfigError::Validation(
                "quality.png_effort must be 0-6".into(),
            ));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("min_savings_ratio", t.min_savings_ratio),
            ("sizes_tolerance", t.sizes_tolerance),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "thresholds.{name} must be in [0, 1)"
                )));
            }
        }
        if !(t.max_display_density > 0.0 && t.max_display_density.is_finite()) {
            return Err(ConfigError::Validation(
                "thresholds.max_display_density must be positive".into(),
            ));
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Encoder quality settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub jpg: u32,
    pub webp: u32,
    pub avif: u32,
    /// GIF optimisation level, higher is smaller and slower.
    pub gif: u8,
    /// oxipng preset used for lossless PNG optimisation.
    pub png_effort: u8,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            jpg: 85,
            webp: 82,
            avif: 64,
            gif: 3,
            png_effort: 2,
        }
    }
}

impl QualityConfig {
    /// Lossy quality used when encoding into `format`.
    pub fn for_format(&self, format: ImageFormat) -> Quality {
        match format {
            ImageFormat::Jpg => Quality::new(self.jpg),
            ImageFormat::Webp => Quality::new(self.webp),
            ImageFormat::Avif => Quality::new(self.avif),
            _ => Quality::default(),
        }
    }

    /// Effort level for encoders without a quality knob.
    pub fn effort_for(&self, format: ImageFormat) -> u8 {
        match format {
            ImageFormat::Gif => self.gif,
            ImageFormat::Png => self.png_effort,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Drop transform payloads from the report, keeping their sizes.
    pub remove_buffers_from_transforms: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            remove_buffers_from_transforms: true,
        }
    }
}

/// Offender thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdsConfig {
    /// Fraction of the file a smaller variant must save to be reported.
    pub min_savings_ratio: f64,
    /// Highest display density not reported as excessive.
    pub max_display_density: f64,
    /// Relative difference allowed between `sizes` and the display width.
    pub sizes_tolerance: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            min_savings_ratio: 0.1,
            max_display_density: 3.0,
            sizes_tolerance: 0.05,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of worker threads for module execution.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default options as a `toml::Value::Table`.
///
/// This is the base layer that user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Options::default())?)
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

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Options, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let options: Options = merged.try_into()?;
    options.validate()?;
    Ok(options)
}

/// Load options, optionally overlaying the config file at `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<Options, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# analyze-image configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with `analyze-image analyze --config config.toml <IMAGE>`.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Encoder settings
# ---------------------------------------------------------------------------
[quality]
# Quality (1-100) used when re-encoding JPEG sources.
jpg = 85

# Quality (1-100) of the lossy WebP alternate.
webp = 82

# Quality (1-100) of the AVIF alternate.
avif = 64

# GIF optimisation level (1-3). Higher is smaller and slower.
gif = 3

# Lossless PNG optimisation preset (0-6). Higher is smaller and slower.
png_effort = 2

# ---------------------------------------------------------------------------
# Report shape
# ---------------------------------------------------------------------------
[output]
# Drop the encoded bytes of every transform from the report.
# Sizes and dimensions are always kept.
remove_buffers_from_transforms = true

# ---------------------------------------------------------------------------
# Offender thresholds
# ---------------------------------------------------------------------------
[thresholds]
# Fraction of the file (0.0-1.0) that an optimised or modern-format variant
# must save before the image is reported as not optimised / old format.
min_savings_ratio = 0.1

# Image pixels per CSS pixel above which the image is reported as too dense.
max_display_density = 3.0

# Relative difference (0.0-1.0) allowed between the width selected by the
# `sizes` attribute and the rendered width.
sizes_tolerance = 0.05

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of worker threads for module execution.
# Omit to use all CPU cores. Values above the core count are clamped down.
# max_threads = 4
"##
}
