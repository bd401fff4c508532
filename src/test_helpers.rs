//! Shared test utilities for the analyze-image test suite.
//!
//! Synthesises real encoded images (so [`RustBackend`](crate::imaging::RustBackend)
//! tests need no fixture files) and builds the image facts the pipeline tests
//! start from.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let jpeg = noisy_jpeg(285, 427, 95);
//! let backend = MockBackend::decoding(jpeg_info(285, 427));
//! ```

use crate::imaging::{ImageFormat, ImageInfo};
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Frame, ImageFormat as CodecFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

// =========================================================================
// Pixel sources
// =========================================================================

/// Cheap deterministic noise so encoders have detail to spend bytes on.
fn noise(x: u32, y: u32, salt: u32) -> u8 {
    let mut v = x
        .wrapping_mul(374_761_393)
        .wrapping_add(y.wrapping_mul(668_265_263))
        .wrapping_add(salt.wrapping_mul(2_246_822_519));
    v = (v ^ (v >> 13)).wrapping_mul(1_274_126_177);
    (v >> 24) as u8
}

fn noisy_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 255 / width.max(1)) as u8).wrapping_add(noise(x, y, 1) / 4),
            ((y * 255 / height.max(1)) as u8).wrapping_add(noise(x, y, 2) / 4),
            noise(x, y, 3),
        ])
    })
}

// =========================================================================
// Encoded images
// =========================================================================

/// A JPEG with gradients plus noise, encoded at `quality`.
pub fn noisy_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(noisy_rgb(width, height))
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .unwrap();
    buf
}

/// A PNG with gradients plus noise.
pub fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(noisy_rgb(width, height))
        .write_to(&mut Cursor::new(&mut buf), CodecFormat::Png)
        .unwrap();
    buf
}

/// A looping GIF with two distinct frames.
pub fn two_frame_gif(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        for shade in [0u8, 255] {
            let frame = RgbaImage::from_pixel(width, height, Rgba([shade, 0, 255 - shade, 255]));
            encoder.encode_frame(Frame::new(frame)).unwrap();
        }
    }
    buf
}

pub const SVG_LOGO: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="64" height="32" viewBox="0 0 64 32">
  <rect width="64" height="32" fill="#336699"/>
</svg>
"##;

// =========================================================================
// Image facts
// =========================================================================

pub fn image_info(format: ImageFormat, width: u32, height: u32, animated: bool) -> ImageInfo {
    ImageInfo {
        format,
        width,
        height,
        animated,
    }
}

pub fn jpeg_info(width: u32, height: u32) -> ImageInfo {
    image_info(ImageFormat::Jpg, width, height, false)
}
