use crate::envelope::{Envelope, Key, TransformResult, Transforms};
use crate::imaging::{ImageFormat, TransformParams};
use crate::pipeline::{Dependency, Module, ModuleContext, ModuleError, ModuleId, required};
use tracing::warn;

/// Encodes modern-format alternates: `webpEncoded` and `avifEncoded`.
///
/// Not applicable to SVG, to AVIF (nothing more modern to offer) or to
/// animated WebP. A WebP source gets no WebP alternate and an animated source
/// gets no AVIF alternate. One failing target does not discard the other;
/// the module only fails when no alternate could be produced.
pub struct Reformat;

fn targets(format: ImageFormat, animated: bool) -> Vec<ImageFormat> {
    let mut targets = Vec::with_capacity(2);
    if format != ImageFormat::Webp {
        targets.push(ImageFormat::Webp);
    }
    if !animated {
        targets.push(ImageFormat::Avif);
    }
    targets
}

impl Module for Reformat {
    fn id(&self) -> ModuleId {
        ModuleId::Reformat
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[
            Dependency::All(Key::StatsFormat),
            Dependency::All(Key::StatsAnimated),
            Dependency::All(Key::StatsFileSize),
        ]
    }

    fn is_applicable(&self, ctx: &ModuleContext<'_>) -> bool {
        let stats = &ctx.snapshot.stats;
        match (stats.format, stats.animated) {
            (Some(ImageFormat::Svg | ImageFormat::Avif), _) => false,
            (Some(ImageFormat::Webp), Some(true)) => false,
            (Some(_), Some(_)) => true,
            _ => false,
        }
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let format = required(ctx.snapshot.stats.format, Key::StatsFormat)?;
        let animated = required(ctx.snapshot.stats.animated, Key::StatsAnimated)?;
        let file_size = required(ctx.snapshot.stats.file_size, Key::StatsFileSize)?;

        let mut transforms = Transforms::default();
        let mut first_error = None;

        for target in targets(format, animated) {
            let params = TransformParams::Reformat {
                format: target,
                quality: ctx.options.quality.for_format(target),
            };
            let body = match ctx.backend.transform(ctx.image, &params) {
                Ok(body) => body,
                Err(e) => {
                    warn!(from = %format, to = %target, error = %e, "Reformat target failed");
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            let result = TransformResult::new(file_size, body).with_current_format(format);
            match target {
                ImageFormat::Webp => transforms.webp_encoded = Some(result),
                _ => transforms.avif_encoded = Some(result),
            }
        }

        if transforms.webp_encoded.is_none() && transforms.avif_encoded.is_none() {
            if let Some(e) = first_error {
                return Err(e.into());
            }
        }

        Ok(Envelope {
            transforms,
            ..Envelope::default()
        })
    }
}
