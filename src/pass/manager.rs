//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{Analysis, AnalysisCache};
use crate::diagnostics::Diagnostics;
use crate::error::{PipelineError, Result};
use crate::ir::Module;
use crate::pass::{Invalidation, ModuleTransformPass};
use crate::transforms;

/// Controls how many times a [`PassManager`] runs its pass sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum IterationPolicy {
    /// Run the sequence exactly once.
    Once,
    /// Run the sequence exactly `n` times, even if nothing changes.
    Times(usize),
    /// Run the sequence until an iteration changes nothing, but never more
    /// than `max_iterations` times.
    UntilStable {
        /// The upper bound on iterations
        max_iterations: usize,
    },
}

/// What happened during a call to [`PassManager::run`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RunSummary {
    /// How many times the full sequence was run.
    pub iterations: usize,
    /// Whether any iteration changed the module.
    pub changed: bool,
    /// Whether the last iteration changed nothing.
    pub converged: bool,
}

/// Manages running an ordered sequence of passes over a module.
///
/// Each manager owns its own [`AnalysisCache`]. After every pass, the analyses
/// that the pass declared in [`ModuleTransformPass::invalidates`] are dropped
/// from the cache before the next pass runs.
///
/// Diagnostics reported by passes never stop the sequence, they are collected
/// and can be retrieved through [`Self::take_diagnostics`].
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn ModuleTransformPass>>,
    analyses: AnalysisCache,
    diagnostics: Diagnostics,
    verify_each: bool,
}

impl PassManager {
    /// Creates a new, empty, pass manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an analysis with the manager's cache.
    pub fn register_analysis<T: Analysis>(&mut self, analysis: T) -> Result<()> {
        self.analyses.register(analysis)
    }

    /// Gets the manager's analysis cache.
    pub fn analyses(&self) -> &AnalysisCache {
        &self.analyses
    }

    /// Adds a transformation pass to the pass manager. This pass's order is defined
    /// relative to other calls to [`Self::add_pass`], passes always run in the order
    /// they were added.
    pub fn add_pass<T: ModuleTransformPass + 'static>(&mut self, pass: T) {
        self.add_boxed(Box::new(pass));
    }

    /// Equivalent to [`Self::add_pass`] for a pass that's already boxed.
    pub fn add_boxed(&mut self, pass: Box<dyn ModuleTransformPass>) {
        self.passes.push(pass);
    }

    /// The number of passes in the sequence.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Checks if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Gets the names of every pass in the sequence, in order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Makes the manager verify the module after every single pass.
    pub fn set_verify_each(&mut self, verify_each: bool) {
        self.verify_each = verify_each;
    }

    /// Runs every pass once, in order. Returns whether any pass changed the module.
    pub fn run_once(&mut self, module: &mut Module) -> Result<bool> {
        let mut changed = false;

        for pass in self.passes.iter_mut() {
            let name = pass.name();
            let scope = pass.invalidates();

            log::debug!("running pass `{name}` over `{}`", module.name());

            let (pass_changed, diagnostics) = pass.run(module, &self.analyses).into_parts();

            if pass_changed && scope.is_nothing() {
                return Err(PipelineError::InvalidationContract { pass: name });
            }

            log::debug!(
                "finished pass `{name}` (changed: {pass_changed}, diagnostics: {})",
                diagnostics.len()
            );

            self.diagnostics.merge(diagnostics);
            self.analyses.invalidate(&scope);
            changed |= pass_changed;

            if self.verify_each {
                transforms::verify_module(module).map_err(|errors| {
                    PipelineError::Verification {
                        after: format!("pass `{name}`"),
                        errors,
                    }
                })?;
            }
        }

        Ok(changed)
    }

    /// Runs the sequence until an iteration doesn't change the module, or until
    /// `max_iterations` iterations have run. Whichever comes first.
    ///
    /// The bound is absolute, the sequence is never run more than `max_iterations`
    /// times even if every iteration changes something.
    pub fn run_to_fixed_point(
        &mut self,
        module: &mut Module,
        max_iterations: usize,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        while summary.iterations < max_iterations {
            summary.iterations += 1;

            if !self.run_once(module)? {
                summary.converged = true;
                break;
            }

            summary.changed = true;
        }

        if summary.converged {
            log::debug!("reached a fixed point after {} iteration(s)", summary.iterations);
        } else {
            log::debug!("gave up after {} iteration(s) without converging", summary.iterations);
        }

        Ok(summary)
    }

    /// Runs the sequence according to `policy`.
    pub fn run(&mut self, module: &mut Module, policy: IterationPolicy) -> Result<RunSummary> {
        match policy {
            IterationPolicy::UntilStable { max_iterations } => {
                self.run_to_fixed_point(module, max_iterations)
            }
            IterationPolicy::Once => self.run_times(module, 1),
            IterationPolicy::Times(n) => self.run_times(module, n),
        }
    }

    fn run_times(&mut self, module: &mut Module, n: usize) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for _ in 0..n {
            let changed = self.run_once(module)?;

            summary.iterations += 1;
            summary.changed |= changed;
            summary.converged = !changed;
        }

        Ok(summary)
    }

    /// Forces analyses to be dropped from the cache, even though no pass declared
    /// that they are stale. This is used at phase boundaries.
    pub fn invalidate_analysis(&mut self, invalidation: &Invalidation) {
        log::trace!("forced invalidation: {invalidation:?}");

        self.analyses.invalidate(invalidation);
    }

    /// Gets every diagnostic reported by passes so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Takes the diagnostics reported so far, leaving the manager's list empty.
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }
}
