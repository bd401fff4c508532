use super::transformable;
use crate::envelope::{Envelope, Key, TransformResult, Transforms};
use crate::imaging::{TransformParams, resize_target};
use crate::pipeline::{Dependency, Module, ModuleContext, ModuleError, ModuleId, required};

/// Shrinks the optimized image to the displayed size in device pixels.
///
/// Works from the optimized body, so `fileSize` of the result is the
/// optimized size rather than the source size.
pub struct Resize;

fn target(ctx: &ModuleContext<'_>) -> Option<((u32, u32), (u32, u32))> {
    let natural = (ctx.snapshot.stats.width?, ctx.snapshot.stats.height?);
    let display = ctx.browser.display_size()?;
    let target = resize_target(natural, display, ctx.browser.dpr())?;
    Some((natural, target))
}

impl Module for Resize {
    fn id(&self) -> ModuleId {
        ModuleId::Resize
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[
            Dependency::All(Key::StatsFormat),
            Dependency::All(Key::StatsAnimated),
            Dependency::All(Key::StatsWidth),
            Dependency::All(Key::StatsHeight),
            Dependency::All(Key::TransformsOptimized),
        ]
    }

    fn is_applicable(&self, ctx: &ModuleContext<'_>) -> bool {
        transformable(ctx.snapshot) && target(ctx).is_some()
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let format = required(ctx.snapshot.stats.format, Key::StatsFormat)?;
        let optimized = required(
            ctx.snapshot.transforms.optimized.as_ref(),
            Key::TransformsOptimized,
        )?;
        let source = required(optimized.body(), Key::TransformsOptimized)?;
        let (natural, (width, height)) = required(target(ctx), Key::StatsWidth)?;

        let params = TransformParams::Resize {
            format,
            width,
            height,
            quality: ctx.options.quality.for_format(format),
        };
        let body = ctx.backend.transform(source, &params)?;

        Ok(Envelope {
            transforms: Transforms {
                resized: Some(
                    TransformResult::new(optimized.new_file_size(), body)
                        .with_dimensions(natural, (width, height)),
                ),
                ..Transforms::default()
            },
            ..Envelope::default()
        })
    }
}
