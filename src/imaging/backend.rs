//! Codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the boundary between the analysis pipeline
//! and actual codec work. It has exactly two operations: `decode` (identify
//! format, dimensions and animation) and `transform` (produce new bytes).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Pipeline modules only
//! ever see `&dyn ImageBackend`, so tests drive them with the recording
//! [`MockBackend`](tests::MockBackend) instead.

use super::format::ImageFormat;
use super::params::{TransformOp, TransformParams};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Transform failed: {0}")]
    Transform(String),
    #[error("Unsupported {op} for {format} images")]
    Unsupported { op: TransformOp, format: ImageFormat },
}

/// Result of a decode (identify) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub animated: bool,
}

/// Trait for codec backends.
///
/// Implementations must be `Sync`: modules of one pipeline round run on the
/// rayon pool and share the backend by reference.
pub trait ImageBackend: Sync {
    /// Identify format, pixel dimensions and animation.
    fn decode(&self, bytes: &[u8]) -> Result<ImageInfo, BackendError>;

    /// Produce a new encoded image from `bytes`.
    fn transform(&self, bytes: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError>;
}
