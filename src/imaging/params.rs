//! Parameter types for codec transforms.
//!
//! These structs describe *what* to produce, not *how*. They are the interface
//! between the pipeline modules (which decide which variants are worth
//! producing) and the [`backend`](super::backend) (which does the pixel work).
//! Keeping them plain data lets tests record and assert on them through a
//! mock backend.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1-100, default 90). Clamped on construction.
//! - [`TransformOp`]: the three operation kinds a backend must support.
//! - [`TransformParams`]: one complete transform request.

use super::format::ImageFormat;
use serde::Serialize;
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Operation kind, used for error reporting and mock recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformOp {
    Resize,
    Reformat,
    Optimize,
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resize => "resize",
            Self::Reformat => "reformat",
            Self::Optimize => "optimize",
        })
    }
}

/// One transform request.
///
/// `format` is always the *output* format. For [`TransformParams::Optimize`]
/// and [`TransformParams::Resize`] it equals the source format; for
/// [`TransformParams::Reformat`] it is the target.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformParams {
    /// Cover-fit to exactly `width` x `height`, re-encoded in the source format.
    Resize {
        format: ImageFormat,
        width: u32,
        height: u32,
        quality: Quality,
    },
    /// Re-encode into another format.
    Reformat {
        format: ImageFormat,
        quality: Quality,
    },
    /// Re-encode in the same format with smaller output as the goal.
    ///
    /// `effort` only matters to encoders without a quality knob: the GIF
    /// optimisation level and the lossless PNG preset.
    Optimize {
        format: ImageFormat,
        quality: Quality,
        effort: u8,
    },
}

impl TransformParams {
    pub fn op(&self) -> TransformOp {
        match self {
            Self::Resize { .. } => TransformOp::Resize,
            Self::Reformat { .. } => TransformOp::Reformat,
            Self::Optimize { .. } => TransformOp::Optimize,
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            Self::Resize { format, .. }
            | Self::Reformat { format, .. }
            | Self::Optimize { format, .. } => *format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn params_accessors() {
        let params = TransformParams::Resize {
            format: ImageFormat::Png,
            width: 10,
            height: 20,
            quality: Quality::new(70),
        };
        assert_eq!(params.op(), TransformOp::Resize);
        assert_eq!(params.format(), ImageFormat::Png);

        let params = TransformParams::Reformat {
            format: ImageFormat::Avif,
            quality: Quality::new(64),
        };
        assert_eq!(params.op().to_string(), "reformat");
        assert_eq!(params.format(), ImageFormat::Avif);
    }
}
