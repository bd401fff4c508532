//! Module orchestration.
//!
//! | Piece | Role |
//! |---|---|
//! | [`Module`] | Contract: dependencies, applicability, execution |
//! | [`catalogue()`] | Fixed, ordered registry keyed by [`ModuleId`] |
//! | [`resolve`] | Ready set for one round |
//! | [`ModulesRunner`] | Round loop, merging, failure isolation, cancellation |
//! | [`run_module`] | One module in isolation, bypassing the resolver |

mod catalogue;
mod module;
mod resolver;
mod runner;

pub use catalogue::{catalogue, module_by_id};
pub use module::{Dependency, Module, ModuleContext, ModuleError, ModuleId, required};
pub use resolver::{Resolution, resolve};
pub use runner::{
    CancelToken, ModuleFailure, ModulesRunner, RunError, RunOutcome, RunState, run_module,
};
