//! Offender detectors.
//!
//! Each detector compares stats or transforms against a threshold from
//! [`ThresholdsConfig`](crate::config::ThresholdsConfig) and writes its key
//! only when the threshold is violated. A clean image produces an empty
//! fragment.

use crate::envelope::{
    Envelope, ExcessiveDensity as ExcessiveDensityReport, IncorrectSizes as IncorrectSizesReport,
    Key, NotOptimized as NotOptimizedReport, OldFormat as OldFormatReport, Offenders,
    ScaledDown as ScaledDownReport,
};
use crate::imaging::sizes_to_px;
use crate::pipeline::{Dependency, Module, ModuleContext, ModuleError, ModuleId, required};

/// Fraction of `original` saved by shrinking it to `new`.
fn savings_ratio(original: u64, new: u64) -> f64 {
    if original == 0 || new >= original {
        return 0.0;
    }
    (original - new) as f64 / original as f64
}

fn offender(offenders: Offenders) -> Envelope {
    Envelope {
        offenders,
        ..Envelope::default()
    }
}

// =========================================================================
// imageNotOptimized
// =========================================================================

/// The optimized variant saves at least `min_savings_ratio`.
pub struct NotOptimized;

impl Module for NotOptimized {
    fn id(&self) -> ModuleId {
        ModuleId::NotOptimized
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[Dependency::All(Key::TransformsOptimized)]
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let optimized = required(
            ctx.snapshot.transforms.optimized.as_ref(),
            Key::TransformsOptimized,
        )?;
        let saved = savings_ratio(optimized.file_size, optimized.new_file_size());
        if saved < ctx.options.thresholds.min_savings_ratio || saved == 0.0 {
            return Ok(Envelope::new());
        }
        Ok(offender(Offenders {
            not_optimized: Some(NotOptimizedReport {
                file_size: optimized.file_size,
                new_file_size: optimized.new_file_size(),
            }),
            ..Offenders::default()
        }))
    }
}

// =========================================================================
// imageScaledDown
// =========================================================================

/// A resized variant exists and is smaller on at least one axis.
pub struct ScaledDown;

impl Module for ScaledDown {
    fn id(&self) -> ModuleId {
        ModuleId::ScaledDown
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[Dependency::All(Key::TransformsResized)]
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let resized = required(ctx.snapshot.transforms.resized.as_ref(), Key::TransformsResized)?;
        let (Some(natural_width), Some(natural_height), Some(new_width), Some(new_height)) = (
            resized.natural_width,
            resized.natural_height,
            resized.new_width,
            resized.new_height,
        ) else {
            return Err(ModuleError::MissingInput(Key::TransformsResized));
        };

        if new_width >= natural_width && new_height >= natural_height {
            return Ok(Envelope::new());
        }
        Ok(offender(Offenders {
            scaled_down: Some(ScaledDownReport {
                file_size: resized.file_size,
                new_file_size: resized.new_file_size(),
                natural_width,
                natural_height,
                new_width,
                new_height,
            }),
            ..Offenders::default()
        }))
    }
}

// =========================================================================
// imageOldFormat
// =========================================================================

/// A legacy raster source where the smallest modern alternate saves at least
/// `min_savings_ratio`.
pub struct OldFormat;

impl Module for OldFormat {
    fn id(&self) -> ModuleId {
        ModuleId::OldFormat
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[
            Dependency::All(Key::StatsFormat),
            Dependency::All(Key::StatsFileSize),
            Dependency::Any(&[Key::TransformsWebpEncoded, Key::TransformsAvifEncoded]),
        ]
    }

    fn is_applicable(&self, ctx: &ModuleContext<'_>) -> bool {
        ctx.snapshot
            .stats
            .format
            .is_some_and(|format| format.is_legacy_raster())
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let format = required(ctx.snapshot.stats.format, Key::StatsFormat)?;
        let file_size = required(ctx.snapshot.stats.file_size, Key::StatsFileSize)?;
        let transforms = &ctx.snapshot.transforms;
        let webp_size = transforms.webp_encoded.as_ref().map(|t| t.new_file_size());
        let avif_size = transforms.avif_encoded.as_ref().map(|t| t.new_file_size());

        let smallest = required(
            webp_size.into_iter().chain(avif_size).min(),
            Key::TransformsWebpEncoded,
        )?;
        let saved = savings_ratio(file_size, smallest);
        if saved < ctx.options.thresholds.min_savings_ratio || saved == 0.0 {
            return Ok(Envelope::new());
        }
        Ok(offender(Offenders {
            old_format: Some(OldFormatReport {
                current_format: format,
                file_size,
                new_file_size: smallest,
                webp_size,
                avif_size,
            }),
            ..Offenders::default()
        }))
    }
}

// =========================================================================
// imageWithIncorrectSizesParam
// =========================================================================

/// The width selected by `sizes` is off from the display width by more than
/// `sizes_tolerance`.
pub struct IncorrectSizes;

impl Module for IncorrectSizes {
    fn id(&self) -> ModuleId {
        ModuleId::IncorrectSizes
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[Dependency::All(Key::StatsSizesAttribute)]
    }

    fn is_applicable(&self, ctx: &ModuleContext<'_>) -> bool {
        ctx.browser.display_width.is_some_and(|w| w > 0) && ctx.browser.viewport().is_some()
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let sizes = required(
            ctx.snapshot.stats.sizes_attribute.as_deref(),
            Key::StatsSizesAttribute,
        )?;
        let (Some(display_width), Some(viewport)) =
            (ctx.browser.display_width, ctx.browser.viewport())
        else {
            return Ok(Envelope::new());
        };
        let Some(converted) = sizes_to_px(sizes, viewport) else {
            return Ok(Envelope::new());
        };

        let tolerance = ctx.options.thresholds.sizes_tolerance * display_width as f64;
        if (converted as f64 - display_width as f64).abs() <= tolerance {
            return Ok(Envelope::new());
        }
        Ok(offender(Offenders {
            incorrect_sizes: Some(IncorrectSizesReport {
                sizes_attribute: sizes.to_string(),
                converted_in_px: converted,
                display_width,
            }),
            ..Offenders::default()
        }))
    }
}

// =========================================================================
// imageExcessiveDensity
// =========================================================================

/// Display density above `max_display_density`.
pub struct ExcessiveDensity;

impl Module for ExcessiveDensity {
    fn id(&self) -> ModuleId {
        ModuleId::ExcessiveDensity
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[
            Dependency::All(Key::StatsDisplayDensity),
            Dependency::All(Key::StatsDisplayRatio),
        ]
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let density = required(ctx.snapshot.stats.display_density, Key::StatsDisplayDensity)?;
        let ratio = required(ctx.snapshot.stats.display_ratio, Key::StatsDisplayRatio)?;
        let max_density = ctx.options.thresholds.max_display_density;

        if density <= max_density {
            return Ok(Envelope::new());
        }
        Ok(offender(Offenders {
            excessive_density: Some(ExcessiveDensityReport {
                display_density: density,
                display_ratio: ratio,
                max_density,
            }),
            ..Offenders::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{Harness, decoded};
    use super::savings_ratio;
    use crate::envelope::{Envelope, Key, TransformResult};
    use crate::imaging::ImageFormat;
    use crate::imaging::backend::tests::MockBackend;
    use crate::pipeline::{ModuleError, ModuleId};
    use crate::test_helpers::{image_info, jpeg_info};
    use crate::types::BrowserData;

    fn with_snapshot(snapshot: Envelope) -> Harness {
        Harness::new(MockBackend::new()).with_snapshot(snapshot)
    }

    #[test]
    fn savings_ratio_edges() {
        assert_eq!(savings_ratio(0, 0), 0.0);
        assert_eq!(savings_ratio(100, 150), 0.0);
        assert_eq!(savings_ratio(100, 75), 0.25);
    }

    // =========================================================================
    // imageNotOptimized
    // =========================================================================

    fn optimized(file_size: u64, new_size: usize) -> Envelope {
        let mut snapshot = decoded(jpeg_info(100, 100), file_size);
        snapshot.transforms.optimized = Some(TransformResult::new(file_size, vec![0; new_size]));
        snapshot
    }

    #[test]
    fn not_optimized_when_savings_reach_threshold() {
        let fragment = with_snapshot(optimized(1000, 900))
            .run(ModuleId::NotOptimized)
            .unwrap()
            .unwrap();

        let report = fragment.offenders.not_optimized.unwrap();
        assert_eq!((report.file_size, report.new_file_size), (1000, 900));
    }

    #[test]
    fn small_savings_are_not_reported() {
        let fragment = with_snapshot(optimized(1000, 950))
            .run(ModuleId::NotOptimized)
            .unwrap()
            .unwrap();
        assert!(fragment.is_empty());

        let fragment = with_snapshot(optimized(1000, 1200))
            .run(ModuleId::NotOptimized)
            .unwrap()
            .unwrap();
        assert!(fragment.is_empty());
    }

    // =========================================================================
    // imageScaledDown
    // =========================================================================

    fn resized(natural: (u32, u32), new: (u32, u32)) -> Envelope {
        let mut snapshot = decoded(jpeg_info(natural.0, natural.1), 20_000);
        snapshot.transforms.resized =
            Some(TransformResult::new(15_000, vec![0; 3_000]).with_dimensions(natural, new));
        snapshot
    }

    #[test]
    fn scaled_down_mirrors_resized_transform() {
        let fragment = with_snapshot(resized((285, 427), (200, 100)))
            .run(ModuleId::ScaledDown)
            .unwrap()
            .unwrap();

        let report = fragment.offenders.scaled_down.unwrap();
        assert_eq!(report.file_size, 15_000);
        assert_eq!(report.new_file_size, 3_000);
        assert_eq!((report.natural_width, report.natural_height), (285, 427));
        assert_eq!((report.new_width, report.new_height), (200, 100));
    }

    #[test]
    fn same_dimensions_are_not_scaled_down() {
        let fragment = with_snapshot(resized((200, 100), (200, 100)))
            .run(ModuleId::ScaledDown)
            .unwrap()
            .unwrap();
        assert!(fragment.is_empty());
    }

    #[test]
    fn scaled_down_needs_resized_transform() {
        assert_eq!(
            with_snapshot(decoded(jpeg_info(10, 10), 100)).run(ModuleId::ScaledDown),
            Err(ModuleError::MissingInput(Key::TransformsResized))
        );
    }

    // =========================================================================
    // imageOldFormat
    // =========================================================================

    fn reformatted(format: ImageFormat, webp: Option<usize>, avif: Option<usize>) -> Envelope {
        let mut snapshot = decoded(image_info(format, 100, 100, false), 1000);
        snapshot.transforms.webp_encoded =
            webp.map(|len| TransformResult::new(1000, vec![0; len]).with_current_format(format));
        snapshot.transforms.avif_encoded =
            avif.map(|len| TransformResult::new(1000, vec![0; len]).with_current_format(format));
        snapshot
    }

    #[test]
    fn old_format_reports_smallest_alternate() {
        let fragment = with_snapshot(reformatted(ImageFormat::Jpg, Some(600), Some(400)))
            .run(ModuleId::OldFormat)
            .unwrap()
            .unwrap();

        let report = fragment.offenders.old_format.unwrap();
        assert_eq!(report.current_format, ImageFormat::Jpg);
        assert_eq!(report.file_size, 1000);
        assert_eq!(report.new_file_size, 400);
        assert_eq!(report.webp_size, Some(600));
        assert_eq!(report.avif_size, Some(400));
    }

    #[test]
    fn old_format_with_only_one_alternate() {
        let fragment = with_snapshot(reformatted(ImageFormat::Gif, Some(500), None))
            .run(ModuleId::OldFormat)
            .unwrap()
            .unwrap();

        let report = fragment.offenders.old_format.unwrap();
        assert_eq!(report.new_file_size, 500);
        assert_eq!(report.avif_size, None);
    }

    #[test]
    fn modern_source_is_not_old_format() {
        let harness = with_snapshot(reformatted(ImageFormat::Webp, None, Some(400)));
        assert_eq!(harness.run(ModuleId::OldFormat), Ok(None));
    }

    #[test]
    fn larger_alternates_are_not_reported() {
        let fragment = with_snapshot(reformatted(ImageFormat::Png, Some(1500), Some(950)))
            .run(ModuleId::OldFormat)
            .unwrap()
            .unwrap();
        assert!(fragment.is_empty());
    }

    #[test]
    fn old_format_waits_for_an_alternate() {
        assert_eq!(
            with_snapshot(reformatted(ImageFormat::Jpg, None, None)).run(ModuleId::OldFormat),
            Err(ModuleError::MissingInput(Key::TransformsWebpEncoded))
        );
    }

    // =========================================================================
    // imageWithIncorrectSizesParam
    // =========================================================================

    fn sizes_harness(sizes: &str, display_width: u32) -> Harness {
        let mut snapshot = decoded(jpeg_info(285, 427), 20_000);
        snapshot.stats.sizes_attribute = Some(sizes.to_string());
        with_snapshot(snapshot).with_browser(BrowserData {
            display_width: Some(display_width),
            display_height: Some(100),
            viewport_width: Some(1200),
            viewport_height: Some(800),
            sizes_attribute: Some(sizes.to_string()),
            ..BrowserData::default()
        })
    }

    #[test]
    fn incorrect_sizes_reports_conversion() {
        let fragment = sizes_harness("5vw", 200)
            .run(ModuleId::IncorrectSizes)
            .unwrap()
            .unwrap();

        let report = fragment.offenders.incorrect_sizes.unwrap();
        assert_eq!(report.sizes_attribute, "5vw");
        assert_eq!(report.converted_in_px, 60);
        assert_eq!(report.display_width, 200);
    }

    #[test]
    fn sizes_within_tolerance() {
        // 17vw of 1200 = 204, within 5% of 200
        let fragment = sizes_harness("17vw", 200)
            .run(ModuleId::IncorrectSizes)
            .unwrap()
            .unwrap();
        assert!(fragment.is_empty());
    }

    #[test]
    fn unresolvable_sizes_are_not_reported() {
        let fragment = sizes_harness("calc(100vw - 2rem)", 200)
            .run(ModuleId::IncorrectSizes)
            .unwrap()
            .unwrap();
        assert!(fragment.is_empty());
    }

    #[test]
    fn incorrect_sizes_needs_viewport() {
        let mut harness = sizes_harness("5vw", 200);
        harness.browser.viewport_width = None;
        assert_eq!(harness.run(ModuleId::IncorrectSizes), Ok(None));
    }

    // =========================================================================
    // imageExcessiveDensity
    // =========================================================================

    fn density(display_density: f64) -> Harness {
        let mut snapshot = decoded(jpeg_info(1000, 1000), 20_000);
        snapshot.stats.display_density = Some(display_density);
        snapshot.stats.display_ratio = Some(display_density);
        with_snapshot(snapshot)
    }

    #[test]
    fn density_within_ceiling_is_absent() {
        let fragment = density(2.8475).run(ModuleId::ExcessiveDensity).unwrap().unwrap();
        assert!(fragment.is_empty());

        let fragment = density(3.0).run(ModuleId::ExcessiveDensity).unwrap().unwrap();
        assert!(fragment.is_empty());
    }

    #[test]
    fn density_above_ceiling_is_reported() {
        let fragment = density(5.0).run(ModuleId::ExcessiveDensity).unwrap().unwrap();

        let report = fragment.offenders.excessive_density.unwrap();
        assert_eq!(report.display_density, 5.0);
        assert_eq!(report.max_density, 3.0);
    }
}
