use crate::envelope::{Envelope, Stats};
use crate::pipeline::{Dependency, Module, ModuleContext, ModuleError, ModuleId};

/// Identifies the image: format, MIME type, size, dimensions, animation.
///
/// Every other module depends on its output, so a decode failure here fails
/// the whole run.
pub struct ContentType;

impl Module for ContentType {
    fn id(&self) -> ModuleId {
        ModuleId::ContentType
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &[]
    }

    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError> {
        let info = ctx.backend.decode(ctx.image)?;
        Ok(Envelope {
            stats: Stats {
                format: Some(info.format),
                mime_type: Some(info.format.mime_type().to_string()),
                file_size: Some(ctx.image.len() as u64),
                width: Some(info.width),
                height: Some(info.height),
                animated: Some(info.animated),
                ..Stats::default()
            },
            ..Envelope::default()
        })
    }
}
