//! The result envelope: `stats`, `transforms` and `offenders`.
//!
//! One [`Envelope`] is created empty per run and grows as modules complete.
//! Modules return *fragments*, which are envelopes holding only the keys the
//! module wrote. [`Envelope::merge`] is append-only: a key that is already
//! present is never overwritten, and a fragment that would overwrite one is
//! rejected as a whole.
//!
//! Every addressable entry has a [`Key`], a closed enumeration mirroring the
//! dotted JSON path (`stats.format`, `transforms.webpEncoded`, …). Modules
//! declare their inputs in terms of these keys.
//!
//! Offenders have presence-only semantics: an absent key means "no violation
//! of that kind", never "unknown".

use crate::imaging::ImageFormat;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Serialize, Serializer};
use std::fmt;

/// Addressable entry of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    StatsFormat,
    StatsMimeType,
    StatsFileSize,
    StatsWidth,
    StatsHeight,
    StatsAnimated,
    StatsDisplayDensity,
    StatsDisplayRatio,
    StatsSizesAttribute,
    StatsSrcsetAttribute,
    TransformsOptimized,
    TransformsResized,
    TransformsWebpEncoded,
    TransformsAvifEncoded,
    OffendersNotOptimized,
    OffendersScaledDown,
    OffendersOldFormat,
    OffendersIncorrectSizes,
    OffendersExcessiveDensity,
}

impl Key {
    pub const ALL: [Key; 19] = [
        Key::StatsFormat,
        Key::StatsMimeType,
        Key::StatsFileSize,
        Key::StatsWidth,
        Key::StatsHeight,
        Key::StatsAnimated,
        Key::StatsDisplayDensity,
        Key::StatsDisplayRatio,
        Key::StatsSizesAttribute,
        Key::StatsSrcsetAttribute,
        Key::TransformsOptimized,
        Key::TransformsResized,
        Key::TransformsWebpEncoded,
        Key::TransformsAvifEncoded,
        Key::OffendersNotOptimized,
        Key::OffendersScaledDown,
        Key::OffendersOldFormat,
        Key::OffendersIncorrectSizes,
        Key::OffendersExcessiveDensity,
    ];

    /// Dotted path of the key in the serialized envelope.
    pub fn as_str(self) -> &'static str {
        match self {
            Key::StatsFormat => "stats.format",
            Key::StatsMimeType => "stats.mimeType",
            Key::StatsFileSize => "stats.fileSize",
            Key::StatsWidth => "stats.width",
            Key::StatsHeight => "stats.height",
            Key::StatsAnimated => "stats.animated",
            Key::StatsDisplayDensity => "stats.displayDensity",
            Key::StatsDisplayRatio => "stats.displayRatio",
            Key::StatsSizesAttribute => "stats.sizesAttribute",
            Key::StatsSrcsetAttribute => "stats.srcsetAttribute",
            Key::TransformsOptimized => "transforms.optimized",
            Key::TransformsResized => "transforms.resized",
            Key::TransformsWebpEncoded => "transforms.webpEncoded",
            Key::TransformsAvifEncoded => "transforms.avifEncoded",
            Key::OffendersNotOptimized => "offenders.imageNotOptimized",
            Key::OffendersScaledDown => "offenders.imageScaledDown",
            Key::OffendersOldFormat => "offenders.imageOldFormat",
            Key::OffendersIncorrectSizes => "offenders.imageWithIncorrectSizesParam",
            Key::OffendersExcessiveDensity => "offenders.imageExcessiveDensity",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar facts about the source image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    /// Source pixels per CSS pixel, averaged over both axes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_density: Option<f64>,
    /// `display_density` relative to the device pixel ratio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcset_attribute: Option<String>,
}

fn serialize_body<S: Serializer>(body: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match body {
        Some(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

/// Outcome of one byte-producing operation.
///
/// `new_file_size` is fixed from the body when the result is built, so it
/// always equals the body length while the body is retained.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    /// Size of the bytes the transform started from.
    pub file_size: u64,
    new_file_size: u64,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_body"
    )]
    body: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_format: Option<ImageFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_height: Option<u32>,
}

impl TransformResult {
    pub fn new(file_size: u64, body: Vec<u8>) -> Self {
        Self {
            file_size,
            new_file_size: body.len() as u64,
            body: Some(body),
            current_format: None,
            natural_width: None,
            natural_height: None,
            new_width: None,
            new_height: None,
        }
    }

    pub fn with_current_format(mut self, format: ImageFormat) -> Self {
        self.current_format = Some(format);
        self
    }

    pub fn with_dimensions(mut self, natural: (u32, u32), new: (u32, u32)) -> Self {
        self.natural_width = Some(natural.0);
        self.natural_height = Some(natural.1);
        self.new_width = Some(new.0);
        self.new_height = Some(new.1);
        self
    }

    pub fn new_file_size(&self) -> u64 {
        self.new_file_size
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Drop the payload; `new_file_size` is kept.
    pub fn strip_body(&mut self) {
        self.body = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transforms {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized: Option<TransformResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resized: Option<TransformResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webp_encoded: Option<TransformResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avif_encoded: Option<TransformResult>,
}

impl Transforms {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut TransformResult> {
        [
            self.optimized.as_mut(),
            self.resized.as_mut(),
            self.webp_encoded.as_mut(),
            self.avif_encoded.as_mut(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Re-encoding in the same format would save a material amount of bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotOptimized {
    pub file_size: u64,
    pub new_file_size: u64,
}

/// The image is served larger than it is displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaledDown {
    pub file_size: u64,
    pub new_file_size: u64,
    pub natural_width: u32,
    pub natural_height: u32,
    pub new_width: u32,
    pub new_height: u32,
}

/// A legacy raster format where a modern one is materially smaller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OldFormat {
    pub current_format: ImageFormat,
    pub file_size: u64,
    /// Smallest of the modern encodings.
    pub new_file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webp_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avif_size: Option<u64>,
}

/// The `sizes` attribute disagrees with the actual display width.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncorrectSizes {
    pub sizes_attribute: String,
    pub converted_in_px: u32,
    pub display_width: u32,
}

/// More source pixels per CSS pixel than any screen can use.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcessiveDensity {
    pub display_density: f64,
    pub display_ratio: f64,
    pub max_density: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Offenders {
    #[serde(rename = "imageNotOptimized", skip_serializing_if = "Option::is_none")]
    pub not_optimized: Option<NotOptimized>,
    #[serde(rename = "imageScaledDown", skip_serializing_if = "Option::is_none")]
    pub scaled_down: Option<ScaledDown>,
    #[serde(rename = "imageOldFormat", skip_serializing_if = "Option::is_none")]
    pub old_format: Option<OldFormat>,
    #[serde(
        rename = "imageWithIncorrectSizesParam",
        skip_serializing_if = "Option::is_none"
    )]
    pub incorrect_sizes: Option<IncorrectSizes>,
    #[serde(
        rename = "imageExcessiveDensity",
        skip_serializing_if = "Option::is_none"
    )]
    pub excessive_density: Option<ExcessiveDensity>,
}

/// Accumulated results of one run, also used for module fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Envelope {
    pub stats: Stats,
    pub transforms: Transforms,
    pub offenders: Offenders,
}

/// Move `value` into an empty slot. Conflicts are ruled out before this runs.
fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: Key) -> bool {
        let s = &self.stats;
        let t = &self.transforms;
        let o = &self.offenders;
        match key {
            Key::StatsFormat => s.format.is_some(),
            Key::StatsMimeType => s.mime_type.is_some(),
            Key::StatsFileSize => s.file_size.is_some(),
            Key::StatsWidth => s.width.is_some(),
            Key::StatsHeight => s.height.is_some(),
            Key::StatsAnimated => s.animated.is_some(),
            Key::StatsDisplayDensity => s.display_density.is_some(),
            Key::StatsDisplayRatio => s.display_ratio.is_some(),
            Key::StatsSizesAttribute => s.sizes_attribute.is_some(),
            Key::StatsSrcsetAttribute => s.srcset_attribute.is_some(),
            Key::TransformsOptimized => t.optimized.is_some(),
            Key::TransformsResized => t.resized.is_some(),
            Key::TransformsWebpEncoded => t.webp_encoded.is_some(),
            Key::TransformsAvifEncoded => t.avif_encoded.is_some(),
            Key::OffendersNotOptimized => o.not_optimized.is_some(),
            Key::OffendersScaledDown => o.scaled_down.is_some(),
            Key::OffendersOldFormat => o.old_format.is_some(),
            Key::OffendersIncorrectSizes => o.incorrect_sizes.is_some(),
            Key::OffendersExcessiveDensity => o.excessive_density.is_some(),
        }
    }

    /// Keys present, in declaration order.
    pub fn keys(&self) -> Vec<Key> {
        Key::ALL.into_iter().filter(|k| self.has(*k)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Append every key of `fragment`.
    ///
    /// Returns the keys written. If any key of the fragment is already
    /// present, nothing is merged and the first conflicting key is returned
    /// as the error.
    pub fn merge(&mut self, fragment: Envelope) -> Result<Vec<Key>, Key> {
        let written = fragment.keys();
        if let Some(conflict) = written.iter().copied().find(|k| self.has(*k)) {
            return Err(conflict);
        }

        let Envelope {
            stats,
            transforms,
            offenders,
        } = fragment;

        fill(&mut self.stats.format, stats.format);
        fill(&mut self.stats.mime_type, stats.mime_type);
        fill(&mut self.stats.file_size, stats.file_size);
        fill(&mut self.stats.width, stats.width);
        fill(&mut self.stats.height, stats.height);
        fill(&mut self.stats.animated, stats.animated);
        fill(&mut self.stats.display_density, stats.display_density);
        fill(&mut self.stats.display_ratio, stats.display_ratio);
        fill(&mut self.stats.sizes_attribute, stats.sizes_attribute);
        fill(&mut self.stats.srcset_attribute, stats.srcset_attribute);

        fill(&mut self.transforms.optimized, transforms.optimized);
        fill(&mut self.transforms.resized, transforms.resized);
        fill(&mut self.transforms.webp_encoded, transforms.webp_encoded);
        fill(&mut self.transforms.avif_encoded, transforms.avif_encoded);

        fill(&mut self.offenders.not_optimized, offenders.not_optimized);
        fill(&mut self.offenders.scaled_down, offenders.scaled_down);
        fill(&mut self.offenders.old_format, offenders.old_format);
        fill(&mut self.offenders.incorrect_sizes, offenders.incorrect_sizes);
        fill(
            &mut self.offenders.excessive_density,
            offenders.excessive_density,
        );

        Ok(written)
    }

    /// Remove every transform payload, keeping sizes and metrics.
    pub fn strip_bodies(&mut self) {
        self.transforms.iter_mut().for_each(TransformResult::strip_body);
    }
}
