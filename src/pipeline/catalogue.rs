//! The fixed module registry.
//!
//! Order matters: it is the tie-break between modules that become ready in the
//! same round, so the report is reproducible.

use super::module::{Module, ModuleId};
use crate::modules::{
    ContentType, DisplayStats, ExcessiveDensity, IncorrectSizes, NotOptimized, OldFormat, Optimize,
    Reformat, Resize, ScaledDown,
};

static CATALOGUE: [&dyn Module; 10] = [
    &ContentType,
    &DisplayStats,
    &Optimize,
    &Resize,
    &Reformat,
    &NotOptimized,
    &ScaledDown,
    &OldFormat,
    &IncorrectSizes,
    &ExcessiveDensity,
];

/// Every module, in catalogue order.
pub fn catalogue() -> &'static [&'static dyn Module] {
    &CATALOGUE
}

/// Direct reference to one module.
pub fn module_by_id(id: ModuleId) -> &'static dyn Module {
    CATALOGUE[id as usize]
}
