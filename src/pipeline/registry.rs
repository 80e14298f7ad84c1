//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::error::{PipelineError, Result};
use crate::pass::{FunctionToModulePassAdapter, FunctionTransformPass, ModuleTransformPass};
use crate::pipeline::PipelineOptions;
use crate::transforms::*;
use crate::utility::SaHashMap;
use std::fmt;

macro_rules! pass_kinds {
    ( $( $(#[$doc:meta])* $kind:ident => $name:literal, )* ) => {
        /// Every pass that a pipeline can schedule.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub enum PassKind {
            $( $(#[$doc])* $kind, )*
        }

        impl PassKind {
            /// Every kind of pass, in declaration order.
            pub const ALL: &'static [PassKind] = &[$( PassKind::$kind, )*];

            /// Gets the stable name of the pass, as it appears in logs.
            pub fn name(self) -> &'static str {
                match self {
                    $( PassKind::$kind => $name, )*
                }
            }
        }
    };
}

pass_kinds! {
    /// Inlines `transparent` functions.
    MandatoryInlining => "mandatory-inlining",
    /// Promotes by-reference captures to by-value captures.
    CapturePromotion => "capture-promotion",
    /// Moves non-escaping boxes to the stack.
    AllocBoxToStack => "alloc-box-to-stack",
    /// Removes stack copies of in-out arguments.
    InOutDeshadowing => "in-out-deshadowing",
    /// Marks code after `noreturn` calls as unreachable.
    NoReturnFolding => "no-return-folding",
    /// Diagnoses reads of uninitialized memory.
    DefiniteInitialization => "definite-initialization",
    /// Forwards stores to loads.
    PredictableMemoryOpts => "predictable-memory-opts",
    /// Folds constants, diagnosing overflow.
    DiagnosticConstantPropagation => "diagnostic-constant-propagation",
    /// Diagnoses and removes unreachable code.
    DiagnoseUnreachable => "diagnose-unreachable",
    /// Diagnoses missing or unexpected returns.
    DataFlowDiagnostics => "data-flow-diagnostics",
    /// Links definitions from the module's loader.
    Linker => "linker",
    /// Specializes calls to generic functions.
    GenericSpecializer => "generic-specializer",
    /// Silently removes unreachable code.
    SimplifyCfg => "simplify-cfg",
    /// Splits aggregate reference counting.
    LowerAggregate => "lower-aggregate",
    /// Local algebraic simplification.
    Combine => "combine",
    /// Scalar replacement of aggregates.
    Sroa => "sroa",
    /// Promotes stack slots to values.
    Mem2Reg => "mem2reg",
    /// Folds constants silently.
    PerformanceConstantPropagation => "performance-constant-propagation",
    /// Dead code elimination.
    Dce => "dce",
    /// Common subexpression elimination.
    Cse => "cse",
    /// Forwards loads and removes dead stores.
    LoadStoreOpts => "load-store-opts",
    /// Sinks retains.
    CodeMotion => "code-motion",
    /// Simplifies enum payload projections.
    EnumSimplification => "enum-simplification",
    /// Removes redundant retain/release pairs.
    GlobalArcOpts => "global-arc-opts",
    /// Devirtualizes calls on final classes.
    Devirtualization => "devirtualization",
    /// Inlines small functions.
    PerformanceInliner => "performance-inliner",
    /// Removes unreachable functions.
    DeadFunctionElimination => "dead-function-elimination",
    /// Removes slots that are never read.
    DeadObjectElimination => "dead-object-elimination",
    /// Removes redundant global accesses.
    GlobalOpt => "global-opt",
    /// Speculatively devirtualizes calls.
    InlineCaches => "inline-caches",
    /// Reports instruction counts.
    InstCount => "inst-count",
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type PassConstructor = Box<dyn Fn(&PipelineOptions) -> Box<dyn ModuleTransformPass>>;

/// Maps every [`PassKind`] to a way of constructing that pass.
///
/// The pipelines never name concrete pass types, they only ask the registry
/// for kinds. This makes it possible to swap passes out (e.g. in tests)
/// without touching the pipeline definitions.
#[derive(Default)]
pub struct PassRegistry {
    constructors: SaHashMap<PassKind, PassConstructor>,
}

fn module_pass<T: ModuleTransformPass + 'static>(pass: T) -> Box<dyn ModuleTransformPass> {
    Box::new(pass)
}

fn function_pass<T: FunctionTransformPass + 'static>(pass: T) -> Box<dyn ModuleTransformPass> {
    Box::new(FunctionToModulePassAdapter::adapt(pass))
}

impl PassRegistry {
    /// Creates a registry with nothing bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every kind bound to its implementation
    /// in [`crate::transforms`].
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register(PassKind::MandatoryInlining, |options| {
            // debug serialization wants the module to round-trip with every function intact
            module_pass(MandatoryInliningPass::new(!options.debug_serialization))
        });
        registry.register(PassKind::CapturePromotion, |_| function_pass(CapturePromotionPass));
        registry.register(PassKind::AllocBoxToStack, |_| module_pass(AllocBoxToStackPass));
        registry.register(PassKind::InOutDeshadowing, |_| function_pass(InOutDeshadowingPass));
        registry.register(PassKind::NoReturnFolding, |_| module_pass(NoReturnFoldingPass));
        registry.register(PassKind::DefiniteInitialization, |_| {
            function_pass(DefiniteInitializationPass)
        });
        registry.register(PassKind::PredictableMemoryOpts, |_| {
            function_pass(PredictableMemoryOptsPass)
        });
        registry.register(PassKind::DiagnosticConstantPropagation, |_| {
            function_pass(ConstantPropagationPass::diagnostic())
        });
        registry.register(PassKind::DiagnoseUnreachable, |_| {
            function_pass(DiagnoseUnreachablePass)
        });
        registry.register(PassKind::DataFlowDiagnostics, |_| {
            function_pass(DataFlowDiagnosticsPass)
        });
        registry.register(PassKind::Linker, |_| module_pass(LinkerPass));
        registry.register(PassKind::GenericSpecializer, |_| module_pass(GenericSpecializerPass));
        registry.register(PassKind::SimplifyCfg, |_| function_pass(SimplifyCfgPass));
        registry.register(PassKind::LowerAggregate, |_| function_pass(LowerAggregatePass));
        registry.register(PassKind::Combine, |_| function_pass(CombinePass));
        registry.register(PassKind::Sroa, |_| function_pass(SroaPass));
        registry.register(PassKind::Mem2Reg, |_| module_pass(Mem2RegPass));
        registry.register(PassKind::PerformanceConstantPropagation, |_| {
            function_pass(ConstantPropagationPass::performance())
        });
        registry.register(PassKind::Dce, |_| function_pass(DeadCodeEliminationPass));
        registry.register(PassKind::Cse, |_| module_pass(CsePass));
        registry.register(PassKind::LoadStoreOpts, |_| function_pass(LoadStoreOptsPass));
        registry.register(PassKind::CodeMotion, |_| function_pass(CodeMotionPass));
        registry.register(PassKind::EnumSimplification, |_| {
            function_pass(EnumSimplificationPass)
        });
        registry.register(PassKind::GlobalArcOpts, |_| function_pass(GlobalArcOptsPass));
        registry.register(PassKind::Devirtualization, |_| module_pass(DevirtualizationPass));
        registry.register(PassKind::PerformanceInliner, |_| {
            module_pass(PerformanceInlinerPass::default())
        });
        registry.register(PassKind::DeadFunctionElimination, |_| {
            module_pass(DeadFunctionEliminationPass)
        });
        registry.register(PassKind::DeadObjectElimination, |_| {
            function_pass(DeadObjectEliminationPass)
        });
        registry.register(PassKind::GlobalOpt, |_| function_pass(GlobalOptPass));
        registry.register(PassKind::InlineCaches, |_| module_pass(InlineCachesPass));
        registry.register(PassKind::InstCount, |_| module_pass(InstCountPass::stderr()));

        registry
    }

    /// Binds `kind` to a constructor, replacing whatever it was bound to before.
    pub fn register<F>(&mut self, kind: PassKind, constructor: F)
    where
        F: Fn(&PipelineOptions) -> Box<dyn ModuleTransformPass> + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
    }

    /// Checks if `kind` is bound to anything.
    pub fn contains(&self, kind: PassKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Constructs a fresh instance of the pass bound to `kind`.
    pub fn create(
        &self,
        kind: PassKind,
        options: &PipelineOptions,
    ) -> Result<Box<dyn ModuleTransformPass>> {
        match self.constructors.get(&kind) {
            Some(constructor) => Ok(constructor(options)),
            None => Err(PipelineError::Configuration(format!(
                "no pass is registered for `{kind}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_binds_everything() {
        let registry = PassRegistry::standard();
        let options = PipelineOptions::default();

        for &kind in PassKind::ALL {
            let pass = registry.create(kind, &options).unwrap();

            assert_eq!(pass.name(), kind.name(), "`{kind}` builds the wrong pass");
        }
    }

    #[test]
    fn unbound_kind() {
        let registry = PassRegistry::new();

        assert!(!registry.contains(PassKind::Dce));
        assert_eq!(
            registry.create(PassKind::Dce, &PipelineOptions::default()).err(),
            Some(PipelineError::Configuration(
                "no pass is registered for `dce`".to_owned()
            ))
        );
    }
}
