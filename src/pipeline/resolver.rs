//! Dependency resolution for one round.
//!
//! A pending module whose dependencies are all present in the snapshot is
//! *decided*: it is either ready (applicable) or skipped (not applicable), and
//! in both cases leaves the pending set for good. Modules whose dependencies
//! are still missing stay pending; the run ends when a round decides nothing.

use super::module::{Module, ModuleContext};

/// Outcome of resolving one round. Values are indices into the module list.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Modules to execute this round, in execution order.
    pub ready: Vec<usize>,
    /// Modules whose inputs are present but that do not apply.
    pub skipped: Vec<usize>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.skipped.is_empty()
    }
}

/// Decide which of `pending` can run against `ctx.snapshot`.
///
/// Ready modules are ordered by the number of dependencies they declare, then
/// by their position in `modules`.
pub fn resolve(modules: &[&dyn Module], pending: &[usize], ctx: &ModuleContext<'_>) -> Resolution {
    let mut resolution = Resolution::default();

    for &index in pending {
        let module = modules[index];
        let satisfied = module
            .dependencies()
            .iter()
            .all(|dep| dep.is_satisfied(ctx.snapshot));
        if !satisfied {
            continue;
        }
        if module.is_applicable(ctx) {
            resolution.ready.push(index);
        } else {
            resolution.skipped.push(index);
        }
    }

    resolution
        .ready
        .sort_by_key(|&index| (modules[index].dependencies().len(), index));
    resolution
}
