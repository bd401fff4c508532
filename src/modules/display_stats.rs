use crate::envelope::{Envelope, Key, Stats};
use crate::imaging::{display_density, normalize_srcset};
use crate::pipeline::{Dependency, Module, ModuleContext, ModuleError, ModuleId, required};

/// Display metrics derived from the browser data: density, ratio and the
/// responsive attributes.
///
/// Only writes the keys it has input for; density needs a display size.
pub struct DisplayStats;

impl Module for DisplayStats {
    fn id(&self) -> ModuleId {
        ModuleId::DisplayStats
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[
            Dependency::All(Key::StatsWidth),
            Dependency::All(Key::StatsHeight),
        ]
    }

    fn is_applicable(&self, ctx: &ModuleContext<'_>) -> bool {
        ctx.browser.has_display_context()
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let width = required(ctx.snapshot.stats.width, Key::StatsWidth)?;
        let height = required(ctx.snapshot.stats.height, Key::StatsHeight)?;

        let density = ctx
            .browser
            .display_size()
            .and_then(|display| display_density((width, height), display));

        Ok(Envelope {
            stats: Stats {
                display_density: density,
                display_ratio: density.map(|d| d / ctx.browser.dpr()),
                sizes_attribute: ctx.browser.sizes_attribute.clone(),
                srcset_attribute: ctx.browser.srcset_attribute.as_deref().map(normalize_srcset),
                ..Stats::default()
            },
            ..Envelope::default()
        })
    }
}
