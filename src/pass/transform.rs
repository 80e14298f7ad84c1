//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::AnalysisCache;
use crate::diagnostics::Diagnostics;
use crate::ir::{Function, Module};
use crate::pass::Invalidation;

/// The outcome of running a transform pass once.
///
/// Passes never set any shared error state, any diagnostics they find
/// are handed back here and merged by the pass manager.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassResult {
    changed: bool,
    diagnostics: Diagnostics,
}

impl PassResult {
    /// Creates a result with no diagnostics.
    pub fn new(changed: bool) -> Self {
        Self {
            changed,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Shorthand for a result that reports no change and no diagnostics.
    pub fn unchanged() -> Self {
        Self::new(false)
    }

    /// Attaches diagnostics to the result.
    pub fn with_diagnostics(self, diagnostics: Diagnostics) -> Self {
        Self {
            changed: self.changed,
            diagnostics,
        }
    }

    /// Whether the pass changed the module.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// The diagnostics the pass reported.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Splits the result into its parts.
    pub fn into_parts(self) -> (bool, Diagnostics) {
        (self.changed, self.diagnostics)
    }
}

/// Models a pass that possibly performs a transformation over an entire module.
///
/// While the pass may not actually modify the IR, it has the ability to, and needs to
/// declare what it may make stale (if anything) through [`Self::invalidates`].
pub trait ModuleTransformPass {
    /// A short, stable name for the pass. Used in logs and errors.
    fn name(&self) -> &'static str;

    /// The analyses that running this pass may make stale.
    fn invalidates(&self) -> Invalidation {
        Invalidation::All
    }

    /// Performs the transformation over a given module.
    ///
    /// This function is expected to act as-if it was pure, i.e. calling the same
    /// pass multiple times on the same IR should produce equivalent IR each time.
    /// A pass instance may be run any number of times.
    fn run(&mut self, module: &mut Module, am: &AnalysisCache) -> PassResult;
}

/// Defines a transformation over a single function.
///
/// These don't have access to the analyses, anything that needs module-wide
/// information should be a [`ModuleTransformPass`] instead.
pub trait FunctionTransformPass {
    /// A short, stable name for the pass.
    fn name(&self) -> &'static str;

    /// See [`ModuleTransformPass::invalidates`].
    fn invalidates(&self) -> Invalidation {
        Invalidation::All
    }

    /// Performs the transformation over a function with a body. Returns
    /// whether the function was changed.
    fn run(&mut self, func: &mut Function, diagnostics: &mut Diagnostics) -> bool;
}

/// Adapts a function transform pass to a module pass that runs the given
/// function pass over every function with a body in the module.
///
/// This is mostly used when building the pass registry.
pub struct FunctionToModulePassAdapter<T> {
    pass: T,
}

impl<T: FunctionTransformPass> FunctionToModulePassAdapter<T> {
    /// Adapts a given pass into a [`FunctionToModulePassAdapter`] that can then
    /// be used as a module pass.
    pub fn adapt(pass: T) -> Self {
        Self { pass }
    }
}

impl<T: FunctionTransformPass> ModuleTransformPass for FunctionToModulePassAdapter<T> {
    fn name(&self) -> &'static str {
        self.pass.name()
    }

    fn invalidates(&self) -> Invalidation {
        self.pass.invalidates()
    }

    fn run(&mut self, module: &mut Module, _: &AnalysisCache) -> PassResult {
        let mut diagnostics = Diagnostics::new();
        let mut changed = false;

        for func in module.functions_mut().filter(|f| !f.is_declaration()) {
            changed |= self.pass.run(func, &mut diagnostics);
        }

        PassResult::new(changed).with_diagnostics(diagnostics)
    }
}
