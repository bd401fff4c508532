//! The catalogue members.
//!
//! | Module | Reads | Writes |
//! |---|---|---|
//! | [`ContentType`] | image bytes | `stats.{format,mimeType,fileSize,width,height,animated}` |
//! | [`DisplayStats`] | `stats.{width,height}`, browser data | `stats.{displayDensity,displayRatio,sizesAttribute,srcsetAttribute}` |
//! | [`Optimize`] | `stats.{format,animated,fileSize}` | `transforms.optimized` |
//! | [`Resize`] | `stats.{format,animated,width,height}`, `transforms.optimized` | `transforms.resized` |
//! | [`Reformat`] | `stats.{format,animated,fileSize}` | `transforms.{webpEncoded,avifEncoded}` |
//! | [`NotOptimized`] | `transforms.optimized` | `offenders.imageNotOptimized` |
//! | [`ScaledDown`] | `transforms.resized` | `offenders.imageScaledDown` |
//! | [`OldFormat`] | `stats.{format,fileSize}`, any of `transforms.{webpEncoded,avifEncoded}` | `offenders.imageOldFormat` |
//! | [`IncorrectSizes`] | `stats.sizesAttribute`, browser data | `offenders.imageWithIncorrectSizesParam` |
//! | [`ExcessiveDensity`] | `stats.{displayDensity,displayRatio}` | `offenders.imageExcessiveDensity` |

mod content_type;
mod display_stats;
mod offenders;
mod optimize;
mod reformat;
mod resize;

pub use content_type::ContentType;
pub use display_stats::DisplayStats;
pub use offenders::{ExcessiveDensity, IncorrectSizes, NotOptimized, OldFormat, ScaledDown};
pub use optimize::Optimize;
pub use reformat::Reformat;
pub use resize::Resize;

use crate::envelope::Envelope;

/// Whether the source can be re-encoded pixel for pixel: a still raster image.
fn transformable(snapshot: &Envelope) -> bool {
    match (snapshot.stats.format, snapshot.stats.animated) {
        (Some(format), Some(false)) => !format.is_vector(),
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::config::Options;
    use crate::envelope::{Envelope, Stats};
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{ImageFormat, ImageInfo, TransformOp};
    use crate::pipeline::{
        ModuleContext, ModuleError, ModuleId, ModulesRunner, RunError, RunOutcome, run_module,
    };
    use crate::test_helpers::{image_info, jpeg_info};
    use crate::types::BrowserData;

    /// Everything needed to build a [`ModuleContext`] in a test.
    pub struct Harness {
        pub backend: MockBackend,
        pub options: Options,
        pub browser: BrowserData,
        pub snapshot: Envelope,
        pub image: Vec<u8>,
    }

    impl Harness {
        pub fn new(backend: MockBackend) -> Self {
            Self {
                backend,
                options: Options::default(),
                browser: BrowserData::default(),
                snapshot: Envelope::new(),
                image: vec![0xAB; 20_000],
            }
        }

        pub fn with_snapshot(mut self, snapshot: Envelope) -> Self {
            self.snapshot = snapshot;
            self
        }

        pub fn with_browser(mut self, browser: BrowserData) -> Self {
            self.browser = browser;
            self
        }

        pub fn ctx(&self) -> ModuleContext<'_> {
            ModuleContext {
                image: &self.image,
                options: &self.options,
                browser: &self.browser,
                snapshot: &self.snapshot,
                backend: &self.backend,
            }
        }

        pub fn run(&self, id: ModuleId) -> Result<Option<Envelope>, ModuleError> {
            run_module(id, &self.ctx())
        }

        pub fn run_pipeline(&self) -> Result<RunOutcome, RunError> {
            ModulesRunner::new(&self.backend, &self.image, &self.options, &self.browser).run()
        }
    }

    /// The snapshot after content type detection.
    pub fn decoded(info: ImageInfo, file_size: u64) -> Envelope {
        Envelope {
            stats: Stats {
                format: Some(info.format),
                mime_type: Some(info.format.mime_type().to_string()),
                file_size: Some(file_size),
                width: Some(info.width),
                height: Some(info.height),
                animated: Some(info.animated),
                ..Stats::default()
            },
            ..Envelope::default()
        }
    }

    // =========================================================================
    // Full catalogue runs
    // =========================================================================

    fn scenario_browser() -> BrowserData {
        BrowserData {
            display_width: Some(200),
            display_height: Some(100),
            viewport_width: Some(1200),
            viewport_height: Some(800),
            sizes_attribute: Some("5vw".into()),
            srcset_attribute: Some("image1.jpg 10w,image2.jpg 20w".into()),
            ..BrowserData::default()
        }
    }

    fn scenario_backend(info: ImageInfo) -> MockBackend {
        let format = info.format;
        MockBackend::decoding(info)
            .with_output(TransformOp::Optimize, format, 15_000)
            .with_output(TransformOp::Resize, format, 3_000)
            .with_output(TransformOp::Reformat, ImageFormat::Webp, 9_000)
            .with_output(TransformOp::Reformat, ImageFormat::Avif, 7_000)
    }

    #[test]
    fn jpeg_scenario() {
        let harness =
            Harness::new(scenario_backend(jpeg_info(285, 427))).with_browser(scenario_browser());

        let outcome = harness.run_pipeline().unwrap();
        let envelope = &outcome.envelope;

        assert!(outcome.failures.is_empty());
        assert_eq!(envelope.stats.format, Some(ImageFormat::Jpg));
        assert_eq!(envelope.stats.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(envelope.stats.animated, Some(false));
        assert_eq!(envelope.stats.sizes_attribute.as_deref(), Some("5vw"));
        assert_eq!(
            envelope.stats.srcset_attribute.as_deref(),
            Some("image1.jpg 10w, image2.jpg 20w")
        );
        assert!((envelope.stats.display_density.unwrap() - 2.8475).abs() < 1e-9);

        let optimized = envelope.transforms.optimized.as_ref().unwrap();
        assert!(optimized.new_file_size() < optimized.file_size);

        let resized = envelope.transforms.resized.as_ref().unwrap();
        assert_eq!((resized.new_width, resized.new_height), (Some(200), Some(100)));
        assert_eq!(resized.file_size, optimized.new_file_size());

        let webp = envelope.transforms.webp_encoded.as_ref().unwrap();
        assert!(webp.new_file_size() < envelope.stats.file_size.unwrap());

        let offenders = &envelope.offenders;
        assert!(offenders.old_format.is_some());
        assert!(offenders.not_optimized.is_some());
        assert!(offenders.scaled_down.is_some());
        assert_eq!(offenders.incorrect_sizes.as_ref().unwrap().converted_in_px, 60);
        assert!(offenders.excessive_density.is_none());
    }

    #[test]
    fn jpeg_scenario_round_order() {
        let harness =
            Harness::new(scenario_backend(jpeg_info(285, 427))).with_browser(scenario_browser());

        let outcome = harness.run_pipeline().unwrap();

        assert_eq!(outcome.rounds, 4);
        assert_eq!(
            outcome.executed,
            vec![
                ModuleId::ContentType,
                ModuleId::DisplayStats,
                ModuleId::Optimize,
                ModuleId::Reformat,
                ModuleId::NotOptimized,
                ModuleId::IncorrectSizes,
                ModuleId::ExcessiveDensity,
                ModuleId::OldFormat,
                ModuleId::Resize,
                ModuleId::ScaledDown,
            ]
        );
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn runs_are_idempotent() {
        let harness =
            Harness::new(scenario_backend(jpeg_info(285, 427))).with_browser(scenario_browser());

        let first = harness.run_pipeline().unwrap();
        let second = harness.run_pipeline().unwrap();

        assert_eq!(first.envelope, second.envelope);
        assert_eq!(first.executed, second.executed);
    }

    #[test]
    fn svg_only_gets_stats() {
        let harness = Harness::new(scenario_backend(image_info(ImageFormat::Svg, 64, 32, false)))
            .with_browser(scenario_browser());

        let outcome = harness.run_pipeline().unwrap();

        assert_eq!(outcome.envelope.stats.format, Some(ImageFormat::Svg));
        assert_eq!(
            outcome.envelope.stats.mime_type.as_deref(),
            Some("image/svg+xml")
        );
        assert_eq!(outcome.envelope.transforms, Default::default());
        assert!(outcome.skipped.contains(&ModuleId::Reformat));
        assert!(outcome.skipped.contains(&ModuleId::Optimize));
        assert_eq!(harness.backend.transform_count(), 0);
    }

    #[test]
    fn animated_webp_has_no_alternates() {
        let harness = Harness::new(scenario_backend(image_info(ImageFormat::Webp, 64, 32, true)));

        let outcome = harness.run_pipeline().unwrap();

        assert!(outcome.envelope.transforms.webp_encoded.is_none());
        assert!(outcome.envelope.transforms.avif_encoded.is_none());
        assert!(outcome.envelope.offenders.old_format.is_none());
        assert!(outcome.skipped.contains(&ModuleId::Reformat));
    }

    #[test]
    fn failed_transform_leaves_other_results() {
        let backend = MockBackend::decoding(jpeg_info(285, 427))
            .failing(TransformOp::Optimize, ImageFormat::Jpg)
            .with_output(TransformOp::Reformat, ImageFormat::Webp, 9_000)
            .with_output(TransformOp::Reformat, ImageFormat::Avif, 7_000);
        let harness = Harness::new(backend).with_browser(scenario_browser());

        let outcome = harness.run_pipeline().unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].module, ModuleId::Optimize);
        let envelope = &outcome.envelope;
        assert!(envelope.transforms.optimized.is_none());
        // Resize and the optimisation offenders depend on the optimized body
        assert!(envelope.transforms.resized.is_none());
        assert!(envelope.offenders.not_optimized.is_none());
        assert!(envelope.offenders.scaled_down.is_none());
        assert!(envelope.offenders.old_format.is_some());
        assert!(envelope.stats.display_density.is_some());
    }

    #[test]
    fn decode_failure_fails_run() {
        let harness = Harness::new(MockBackend::new());
        assert!(matches!(harness.run_pipeline(), Err(RunError::Decode(_))));
        assert_eq!(harness.backend.transform_count(), 0);
    }
}
