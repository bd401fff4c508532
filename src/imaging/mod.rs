//! Codec adapter: everything that touches encoded image bytes.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff format** | ISO-BMFF brand, `image::guess_format`, SVG markup |
//! | **Decode** (identify) | `image`, `avif-parse`, SVG root attributes |
//! | **Transform** | `image` codecs, `webp`, `oxipng` |
//!
//! The module is split into:
//! - **Format**: [`ImageFormat`] and byte sniffing
//! - **Calculations**: Pure functions for display metrics and `sizes` parsing (unit testable)
//! - **Parameters**: Data structures describing transforms
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod format;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, ImageInfo};
pub use calculations::{display_density, normalize_srcset, resize_target, sizes_to_px};
pub use format::{ImageFormat, sniff_format};
pub use params::{Quality, TransformOp, TransformParams};
pub use rust_backend::RustBackend;
