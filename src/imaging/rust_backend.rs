//! Pure Rust codec backend (plus libwebp for lossy WebP).
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify (JPEG, PNG, GIF, WebP, BMP, TIFF) | `image::ImageReader::into_dimensions` |
//! | Identify (AVIF) | `avif-parse` container metadata (no AV1 decode) |
//! | Identify (SVG) | root element `width`/`height`/`viewBox` |
//! | Animation | GIF frame count, WebP `ANIM` chunk, APNG `acTL` |
//! | Resize | `image::DynamicImage::resize_to_fill` with `Lanczos3` |
//! | Encode → JPEG / PNG / GIF | `image` codecs |
//! | Encode → WebP (lossy) | `webp` |
//! | Animated GIF → animated WebP | `webp::AnimEncoder` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Optimize PNG | `oxipng` (lossless) |
//!
//! AVIF and SVG sources are identify-only. The only transform accepted for an
//! animated source is an animated GIF reformatted to WebP; every other encoder
//! here writes a single frame.

use super::backend::{BackendError, ImageBackend, ImageInfo};
use super::format::{ImageFormat, avif_brand, sniff_format};
use super::params::{Quality, TransformOp, TransformParams};
use image::codecs::gif::{GifDecoder, GifEncoder};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngDecoder, PngEncoder};
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, Frame, ImageReader};
use regex::Regex;
use std::io::Cursor;
use std::sync::LazyLock;

/// Size a browser gives an SVG without intrinsic dimensions.
const SVG_DEFAULT_SIZE: (u32, u32) = (300, 150);

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Codec backend built on the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

static SVG_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<svg\b[^>]*>").expect("svg root regex"));
static SVG_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\swidth\s*=\s*["']\s*([0-9]*\.?[0-9]+)\s*(?:px)?\s*["']"#)
        .expect("svg width regex")
});
static SVG_HEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\sheight\s*=\s*["']\s*([0-9]*\.?[0-9]+)\s*(?:px)?\s*["']"#)
        .expect("svg height regex")
});
static SVG_VIEWBOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\sviewBox\s*=\s*["']\s*[-0-9.eE]+[\s,]+[-0-9.eE]+[\s,]+([0-9.eE]+)[\s,]+([0-9.eE]+)\s*["']"#)
        .expect("svg viewBox regex")
});

/// Intrinsic size of an SVG document in CSS pixels.
///
/// Explicit pixel `width`/`height` win; a missing one is derived from the
/// `viewBox` aspect ratio. Without any of them the CSS default applies.
fn svg_dimensions(bytes: &[u8]) -> (u32, u32) {
    let text = String::from_utf8_lossy(bytes);
    let Some(root) = SVG_ROOT.find(&text) else {
        return SVG_DEFAULT_SIZE;
    };
    let root = root.as_str();
    let attr = |re: &Regex| -> Option<f64> {
        re.captures(root)
            .and_then(|caps| caps[1].parse::<f64>().ok())
            .filter(|v| *v > 0.0)
    };
    let view_box = SVG_VIEWBOX.captures(root).and_then(|caps| {
        let w = caps[1].parse::<f64>().ok()?;
        let h = caps[2].parse::<f64>().ok()?;
        (w > 0.0 && h > 0.0).then_some((w, h))
    });

    let (width, height) = match (attr(&SVG_WIDTH), attr(&SVG_HEIGHT), view_box) {
        (Some(w), Some(h), _) => (w, h),
        (Some(w), None, Some((vw, vh))) => (w, w * vh / vw),
        (None, Some(h), Some((vw, vh))) => (h * vw / vh, h),
        (None, None, Some(size)) => size,
        _ => return SVG_DEFAULT_SIZE,
    };
    (width.round() as u32, height.round() as u32)
}

/// Extract dimensions from an AVIF container (no AV1 decode needed).
fn identify_avif(bytes: &[u8]) -> Result<(u32, u32), BackendError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| BackendError::Decode(format!("Failed to parse AVIF: {e:?}")))?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| BackendError::Decode(format!("Failed to read AVIF metadata: {e:?}")))?;
    Ok((meta.max_frame_width.get(), meta.max_frame_height.get()))
}

/// Whether a raster image has more than one frame.
fn is_animated(bytes: &[u8], format: ImageFormat) -> bool {
    match format {
        ImageFormat::Gif => GifDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.into_frames().take(2).filter(Result::is_ok).count() > 1)
            .unwrap_or(false),
        ImageFormat::Webp => WebPDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.has_animation())
            .unwrap_or(false),
        ImageFormat::Png => PngDecoder::new(Cursor::new(bytes))
            .and_then(|decoder| decoder.is_apng())
            .unwrap_or(false),
        ImageFormat::Avif => avif_brand(bytes).unwrap_or(false),
        _ => false,
    }
}

/// Decode a raster image to pixels.
fn load_image(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, BackendError> {
    let image_format = format
        .to_image_format()
        .ok_or_else(|| BackendError::Decode(format!("{format} has no pixel decoder")))?;
    image::load_from_memory_with_format(bytes, image_format)
        .map_err(|e| BackendError::Decode(format!("Failed to decode {format}: {e}")))
}

fn encode_failed(format: ImageFormat, e: impl std::fmt::Display) -> BackendError {
    BackendError::Transform(format!("{format} encode failed: {e}"))
}

/// GIF quantizer speed for an optimisation level (1..=3, higher = smaller).
fn gif_speed(level: u8) -> i32 {
    match level {
        0 | 1 => 30,
        2 => 10,
        _ => 1,
    }
}

/// Encode pixels into `format`.
fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
    effort: u8,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| encode_failed(format, e))?;
        }
        ImageFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            img.write_with_encoder(encoder)
                .map_err(|e| encode_failed(format, e))?;
        }
        ImageFormat::Gif => {
            let mut encoder = GifEncoder::new_with_speed(&mut buf, gif_speed(effort));
            encoder
                .encode_frame(Frame::new(img.to_rgba8()))
                .map_err(|e| encode_failed(format, e))?;
        }
        ImageFormat::Webp => {
            let memory = if img.color().has_alpha() {
                let rgba = img.to_rgba8();
                webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height())
                    .encode_simple(false, quality.value() as f32)
            } else {
                let rgb = img.to_rgb8();
                webp::Encoder::from_rgb(&rgb, rgb.width(), rgb.height())
                    .encode_simple(false, quality.value() as f32)
            }
            .map_err(|e| encode_failed(format, format!("{e:?}")))?;
            buf.extend_from_slice(&memory);
        }
        ImageFormat::Avif => {
            let pixels = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut buf,
                AVIF_SPEED,
                quality.value() as u8,
            );
            pixels
                .write_with_encoder(encoder)
                .map_err(|e| encode_failed(format, e))?;
        }
        ImageFormat::Bmp | ImageFormat::Tiff => {
            let image_format = format
                .to_image_format()
                .ok_or_else(|| encode_failed(format, "no encoder"))?;
            img.write_to(&mut Cursor::new(&mut buf), image_format)
                .map_err(|e| encode_failed(format, e))?;
        }
        ImageFormat::Svg => return Err(encode_failed(format, "vector output is not supported")),
    }
    Ok(buf)
}

/// Re-encode every GIF frame into an animated lossy WebP.
///
/// Frame delays carry over as WebP timestamps.
fn gif_to_animated_webp(bytes: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError> {
    let frames = GifDecoder::new(Cursor::new(bytes))
        .and_then(|decoder| decoder.into_frames().collect_frames())
        .map_err(|e| BackendError::Decode(format!("Failed to decode gif frames: {e}")))?;
    let (width, height) = frames
        .first()
        .map(|frame| frame.buffer().dimensions())
        .ok_or_else(|| BackendError::Decode("gif has no frames".to_string()))?;

    let mut config = webp::WebPConfig::new()
        .map_err(|_| encode_failed(ImageFormat::Webp, "invalid encoder config"))?;
    config.lossless = 0;
    config.quality = quality.value() as f32;

    let mut encoder = webp::AnimEncoder::new(width, height, &config);
    let mut timestamp_ms = 0i32;
    for frame in &frames {
        encoder.add_frame(webp::AnimFrame::from_rgba(
            frame.buffer().as_raw(),
            width,
            height,
            timestamp_ms,
        ));
        let (numer, denom) = frame.delay().numer_denom_ms();
        timestamp_ms += (numer / denom.max(1)) as i32;
    }
    let memory = encoder
        .try_encode()
        .map_err(|e| encode_failed(ImageFormat::Webp, format!("{e:?}")))?;
    Ok(memory.to_vec())
}

/// Lossless PNG recompression.
fn optimize_png(bytes: &[u8], effort: u8) -> Result<Vec<u8>, BackendError> {
    let options = oxipng::Options::from_preset(effort.min(6));
    oxipng::optimize_from_memory(bytes, &options)
        .map_err(|e| BackendError::Transform(format!("png optimisation failed: {e}")))
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<ImageInfo, BackendError> {
        let format = sniff_format(bytes)
            .ok_or_else(|| BackendError::Decode("Unrecognized image format".to_string()))?;

        let (width, height) = match format {
            ImageFormat::Svg => svg_dimensions(bytes),
            ImageFormat::Avif => identify_avif(bytes)?,
            raster => {
                let image_format = raster
                    .to_image_format()
                    .ok_or_else(|| BackendError::Decode(format!("{raster} is not raster")))?;
                ImageReader::with_format(Cursor::new(bytes), image_format)
                    .into_dimensions()
                    .map_err(|e| {
                        BackendError::Decode(format!("Failed to read dimensions: {e}"))
                    })?
            }
        };

        Ok(ImageInfo {
            format,
            width,
            height,
            animated: is_animated(bytes, format),
        })
    }

    fn transform(&self, bytes: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError> {
        let source = sniff_format(bytes)
            .ok_or_else(|| BackendError::Decode("Unrecognized image format".to_string()))?;
        let op = params.op();
        let animated = is_animated(bytes, source);
        if let (
            ImageFormat::Gif,
            true,
            TransformParams::Reformat {
                format: ImageFormat::Webp,
                quality,
            },
        ) = (source, animated, params)
        {
            return gif_to_animated_webp(bytes, *quality);
        }
        if matches!(source, ImageFormat::Svg | ImageFormat::Avif) || animated {
            return Err(BackendError::Unsupported { op, format: source });
        }
        if op != TransformOp::Reformat && params.format() != source {
            return Err(BackendError::Transform(format!(
                "{op} must keep the source format ({source}), got {}",
                params.format()
            )));
        }

        match *params {
            TransformParams::Optimize {
                format: ImageFormat::Png,
                effort,
                ..
            } => optimize_png(bytes, effort),
            TransformParams::Optimize {
                format,
                quality,
                effort,
            } => encode(&load_image(bytes, source)?, format, quality, effort),
            TransformParams::Reformat { format, quality } => {
                encode(&load_image(bytes, source)?, format, quality, 0)
            }
            TransformParams::Resize {
                format,
                width,
                height,
                quality,
            } => {
                let img = load_image(bytes, source)?;
                let resized = img.resize_to_fill(width, height, FilterType::Lanczos3);
                encode(&resized, format, quality, 0)
            }
        }
    }
}
