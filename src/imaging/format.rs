//! Image formats known to the analyzer and byte-level format sniffing.
//!
//! Sniffing order matters: AVIF is recognised from its ISO-BMFF `ftyp` brand
//! before falling back to [`image::guess_format`], and SVG (which has no magic
//! number) is recognised from its markup last.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source or target image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
    Gif,
    Webp,
    Avif,
    Svg,
    Bmp,
    Tiff,
}

impl ImageFormat {
    /// MIME type as served over HTTP.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Svg => "image/svg+xml",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Svg => "svg",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    /// Raster formats that predate WebP/AVIF and usually lose to them on size.
    pub fn is_legacy_raster(self) -> bool {
        matches!(
            self,
            Self::Jpg | Self::Png | Self::Gif | Self::Bmp | Self::Tiff
        )
    }

    pub fn is_vector(self) -> bool {
        self == Self::Svg
    }

    /// Map to the `image` crate's format, where it has one.
    pub(crate) fn to_image_format(self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::Webp => Some(image::ImageFormat::WebP),
            Self::Avif => Some(image::ImageFormat::Avif),
            Self::Bmp => Some(image::ImageFormat::Bmp),
            Self::Tiff => Some(image::ImageFormat::Tiff),
            Self::Svg => None,
        }
    }

    fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::WebP => Some(Self::Webp),
            image::ImageFormat::Avif => Some(Self::Avif),
            image::ImageFormat::Bmp => Some(Self::Bmp),
            image::ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO-BMFF brand of an AVIF file: `Some(true)` for an image sequence (`avis`),
/// `Some(false)` for a still image (`avif`), `None` when not AVIF.
pub(crate) fn avif_brand(bytes: &[u8]) -> Option<bool> {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return None;
    }
    match &bytes[8..12] {
        b"avis" => Some(true),
        b"avif" => Some(false),
        _ => None,
    }
}

/// Whether the bytes look like SVG markup.
///
/// Only the head of the document is inspected: an XML prolog, comments or a
/// doctype may precede the root `<svg` element.
pub fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(4096)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with('<') && trimmed.contains("<svg")
}

/// Detect the format of an encoded image.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if avif_brand(bytes).is_some() {
        return Some(ImageFormat::Avif);
    }
    if let Some(format) = image::guess_format(bytes)
        .ok()
        .and_then(ImageFormat::from_image_format)
    {
        return Some(format);
    }
    looks_like_svg(bytes).then_some(ImageFormat::Svg)
}
