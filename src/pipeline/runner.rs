//! The round-based orchestrator.
//!
//! ```text
//! Pending ──run()──▶ Running ──no module decided──▶ Completed
//!                       │
//!                       ├── content type failed ──▶ Failed (RunError::Decode)
//!                       └── token cancelled ──────▶ Failed (RunError::Cancelled)
//! ```
//!
//! Each round resolves the ready set against the envelope as it stood when
//! the round started, executes the ready modules on the rayon pool and then
//! merges their fragments in resolver order. No module reads a sibling's
//! output from the same round, so the order of execution never changes the
//! result.
//!
//! A failing module is recorded in [`RunOutcome::failures`] and its keys are
//! simply absent. Only the content-type module is a precondition: without a
//! decoded image nothing else can run, so its failure fails the run.

use super::module::{Module, ModuleContext, ModuleError, ModuleId};
use super::resolver::resolve;
use crate::config::Options;
use crate::envelope::Envelope;
use crate::imaging::{BackendError, ImageBackend};
use crate::types::BrowserData;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("Image could not be decoded: {0}")]
    Decode(BackendError),
    #[error("Run was cancelled")]
    Cancelled,
    #[error("Runner has already been started")]
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Cancels a run between rounds. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A module that could not complete.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleFailure {
    pub module: ModuleId,
    pub reason: ModuleError,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub envelope: Envelope,
    pub failures: Vec<ModuleFailure>,
    /// Modules whose fragment was merged, in merge order.
    pub executed: Vec<ModuleId>,
    /// Modules that were not applicable to this image.
    pub skipped: Vec<ModuleId>,
    pub rounds: usize,
}

/// Drives one analysis run to completion.
pub struct ModulesRunner<'a> {
    backend: &'a dyn ImageBackend,
    image: &'a [u8],
    options: &'a Options,
    browser: &'a BrowserData,
    modules: Vec<&'a dyn Module>,
    cancel: CancelToken,
    state: RunState,
}

impl<'a> ModulesRunner<'a> {
    /// A runner over the full catalogue.
    pub fn new(
        backend: &'a dyn ImageBackend,
        image: &'a [u8],
        options: &'a Options,
        browser: &'a BrowserData,
    ) -> Self {
        Self {
            backend,
            image,
            options,
            browser,
            modules: super::catalogue().to_vec(),
            cancel: CancelToken::new(),
            state: RunState::Pending,
        }
    }

    /// Replace the module list. Position in `modules` is the tie-break order.
    pub fn with_modules(mut self, modules: Vec<&'a dyn Module>) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run every applicable module. A runner can only be run once.
    pub fn run(&mut self) -> Result<RunOutcome, RunError> {
        if self.state != RunState::Pending {
            return Err(RunError::AlreadyStarted);
        }
        self.state = RunState::Running;

        match self.run_rounds() {
            Ok(outcome) => {
                self.state = RunState::Completed;
                info!(
                    rounds = outcome.rounds,
                    executed = outcome.executed.len(),
                    failed = outcome.failures.len(),
                    skipped = outcome.skipped.len(),
                    "Analysis complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.state = RunState::Failed;
                Err(e)
            }
        }
    }

    fn run_rounds(&self) -> Result<RunOutcome, RunError> {
        let modules = &self.modules;
        let mut envelope = Envelope::new();
        let mut pending: Vec<usize> = (0..modules.len()).collect();
        let mut outcome_failures = Vec::new();
        let mut executed = Vec::new();
        let mut skipped = Vec::new();
        let mut rounds = 0;

        loop {
            if self.cancel.is_cancelled() {
                debug!(rounds, "Run cancelled");
                return Err(RunError::Cancelled);
            }

            let ctx = ModuleContext {
                image: self.image,
                options: self.options,
                browser: self.browser,
                snapshot: &envelope,
                backend: self.backend,
            };
            let resolution = resolve(modules, &pending, &ctx);
            if resolution.is_empty() {
                break;
            }
            pending.retain(|i| !resolution.ready.contains(i) && !resolution.skipped.contains(i));

            for &index in &resolution.skipped {
                debug!(module = %modules[index].id(), "Not applicable");
                skipped.push(modules[index].id());
            }
            if resolution.ready.is_empty() {
                continue;
            }

            rounds += 1;
            debug!(
                round = rounds,
                ready = ?resolution.ready.iter().map(|&i| modules[i].id()).collect::<Vec<_>>(),
                "Executing round"
            );

            let results: Vec<(ModuleId, Result<Envelope, ModuleError>)> = resolution
                .ready
                .par_iter()
                .map(|&index| {
                    let module = modules[index];
                    (module.id(), module.execute(&ctx))
                })
                .collect();

            for (id, result) in results {
                let merged = result
                    .and_then(|fragment| envelope.merge(fragment).map_err(ModuleError::Conflict));
                match merged {
                    Ok(keys) => {
                        debug!(module = %id, keys = ?keys, "Module completed");
                        executed.push(id);
                    }
                    Err(reason) if id == ModuleId::ContentType => {
                        warn!(module = %id, error = %reason, "Precondition failed");
                        return Err(RunError::Decode(into_decode_error(reason)));
                    }
                    Err(reason) => {
                        warn!(module = %id, error = %reason, "Module failed");
                        outcome_failures.push(ModuleFailure { module: id, reason });
                    }
                }
            }
        }

        if !pending.is_empty() {
            debug!(
                unresolved = ?pending.iter().map(|&i| modules[i].id()).collect::<Vec<_>>(),
                "Dependencies never satisfied"
            );
        }

        Ok(RunOutcome {
            envelope,
            failures: outcome_failures,
            executed,
            skipped,
            rounds,
        })
    }
}

fn into_decode_error(reason: ModuleError) -> BackendError {
    match reason {
        ModuleError::Backend(BackendError::Decode(msg)) => BackendError::Decode(msg),
        other => BackendError::Decode(other.to_string()),
    }
}

/// Execute one module against a synthetic snapshot, bypassing the resolver.
///
/// Returns `Ok(None)` when the module does not apply, otherwise the fragment
/// it produced. Missing dependencies are reported as
/// [`ModuleError::MissingInput`].
pub fn run_module(id: ModuleId, ctx: &ModuleContext<'_>) -> Result<Option<Envelope>, ModuleError> {
    let module = super::module_by_id(id);
    if let Some(missing) = module
        .dependencies()
        .iter()
        .find(|dep| !dep.is_satisfied(ctx.snapshot))
        .and_then(|dep| dep.missing_key())
    {
        return Err(ModuleError::MissingInput(missing));
    }
    if !module.is_applicable(ctx) {
        return Ok(None);
    }
    module.execute(ctx).map(Some)
}
