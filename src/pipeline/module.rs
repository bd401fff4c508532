//! The module contract.
//!
//! A module declares the envelope keys it needs ([`Module::dependencies`]),
//! decides whether it applies to this image ([`Module::is_applicable`]) and
//! produces an envelope fragment ([`Module::execute`]). Modules never see the
//! live envelope: they get an immutable snapshot through [`ModuleContext`].

use crate::config::Options;
use crate::envelope::{Envelope, Key};
use crate::imaging::{BackendError, ImageBackend};
use crate::types::BrowserData;
use std::fmt;
use thiserror::Error;

/// Closed set of catalogue members, in catalogue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleId {
    ContentType,
    DisplayStats,
    Optimize,
    Resize,
    Reformat,
    NotOptimized,
    ScaledDown,
    OldFormat,
    IncorrectSizes,
    ExcessiveDensity,
}

impl ModuleId {
    pub const ALL: [ModuleId; 10] = [
        ModuleId::ContentType,
        ModuleId::DisplayStats,
        ModuleId::Optimize,
        ModuleId::Resize,
        ModuleId::Reformat,
        ModuleId::NotOptimized,
        ModuleId::ScaledDown,
        ModuleId::OldFormat,
        ModuleId::IncorrectSizes,
        ModuleId::ExcessiveDensity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModuleId::ContentType => "contentType",
            ModuleId::DisplayStats => "displayStats",
            ModuleId::Optimize => "optimize",
            ModuleId::Resize => "resize",
            ModuleId::Reformat => "reformat",
            ModuleId::NotOptimized => "imageNotOptimized",
            ModuleId::ScaledDown => "imageScaledDown",
            ModuleId::OldFormat => "imageOldFormat",
            ModuleId::IncorrectSizes => "imageWithIncorrectSizesParam",
            ModuleId::ExcessiveDensity => "imageExcessiveDensity",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One input requirement of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// The key must be present.
    All(Key),
    /// At least one of the keys must be present.
    Any(&'static [Key]),
}

impl Dependency {
    pub fn is_satisfied(&self, envelope: &Envelope) -> bool {
        match self {
            Dependency::All(key) => envelope.has(*key),
            Dependency::Any(keys) => keys.iter().any(|key| envelope.has(*key)),
        }
    }

    /// Key reported when the dependency is missing.
    pub fn missing_key(&self) -> Option<Key> {
        match self {
            Dependency::All(key) => Some(*key),
            Dependency::Any(keys) => keys.first().copied(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModuleError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Missing input {0}")]
    MissingInput(Key),
    #[error("Key {0} was already written by another module")]
    Conflict(Key),
}

/// Everything a module may read.
#[derive(Clone, Copy)]
pub struct ModuleContext<'a> {
    /// Source image bytes.
    pub image: &'a [u8],
    pub options: &'a Options,
    pub browser: &'a BrowserData,
    /// Envelope as of the start of the current round.
    pub snapshot: &'a Envelope,
    pub backend: &'a dyn ImageBackend,
}

/// Unwrap a snapshot value the module declared as a dependency.
pub fn required<T>(value: Option<T>, key: Key) -> Result<T, ModuleError> {
    value.ok_or(ModuleError::MissingInput(key))
}

/// A unit of analysis or transform logic.
///
/// Implementations must be stateless: a module instance is shared by every
/// run and may execute on any rayon worker.
pub trait Module: Sync {
    fn id(&self) -> ModuleId;

    /// Inputs that must be in the snapshot before the module is considered.
    fn dependencies(&self) -> &'static [Dependency];

    /// Whether the module should run at all for this image. Only called once
    /// every dependency is satisfied.
    fn is_applicable(&self, _ctx: &ModuleContext<'_>) -> bool {
        true
    }

    /// Produce the fragment to merge. An empty fragment is a valid result.
    fn execute(&self, ctx: &ModuleContext<'_>) -> Result<Envelope, ModuleError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ImageFormat;

    #[test]
    fn module_names_match_report_keys() {
        assert_eq!(ModuleId::OldFormat.to_string(), "imageOldFormat");
        assert_eq!(ModuleId::ContentType.name(), "contentType");
    }

    #[test]
    fn all_dependency_needs_its_key() {
        let mut envelope = Envelope::new();
        let dep = Dependency::All(Key::StatsFormat);
        assert!(!dep.is_satisfied(&envelope));

        envelope.stats.format = Some(ImageFormat::Jpg);
        assert!(dep.is_satisfied(&envelope));
    }

    #[test]
    fn any_dependency_needs_one_key() {
        let mut envelope = Envelope::new();
        let dep = Dependency::Any(&[Key::TransformsWebpEncoded, Key::TransformsAvifEncoded]);
        assert!(!dep.is_satisfied(&envelope));
        assert_eq!(dep.missing_key(), Some(Key::TransformsWebpEncoded));

        envelope.transforms.avif_encoded =
            Some(crate::envelope::TransformResult::new(10, vec![0; 5]));
        assert!(dep.is_satisfied(&envelope));
    }

    #[test]
    fn required_reports_missing_key() {
        assert_eq!(required(Some(3), Key::StatsWidth), Ok(3));
        assert_eq!(
            required::<u32>(None, Key::StatsWidth),
            Err(ModuleError::MissingInput(Key::StatsWidth))
        );
    }
}
