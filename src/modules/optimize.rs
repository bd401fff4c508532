use super::transformable;
use crate::envelope::{Envelope, Key, TransformResult, Transforms};
use crate::imaging::TransformParams;
use crate::pipeline::{Dependency, Module, ModuleContext, ModuleError, ModuleId, required};

/// Re-encodes the source in its own format with the configured settings.
pub struct Optimize;

impl Module for Optimize {
    fn id(&self) -> ModuleId {
        ModuleId::Optimize
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[
            Dependency::All(Key::StatsFormat),
            Dependency::All(Key::StatsAnimated),
            Dependency::All(Key::StatsFileSize),
        ]
    }

    fn is_applicable(&self, ctx: &ModuleContext<'_>) -> bool {
        transformable(ctx.snapshot)
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let format = required(ctx.snapshot.stats.format, Key::StatsFormat)?;
        let file_size = required(ctx.snapshot.stats.file_size, Key::StatsFileSize)?;
        let quality = &ctx.options.quality;

        let params = TransformParams::Optimize {
            format,
            quality: quality.for_format(format),
            effort: quality.effort_for(format),
        };
        let body = ctx.backend.transform(ctx.image, &params)?;

        Ok(Envelope {
            transforms: Transforms {
                optimized: Some(TransformResult::new(file_size, body)),
                ..Transforms::default()
            },
            ..Envelope::default()
        })
    }
}
