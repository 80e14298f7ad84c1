//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{AliasAnalysis, CallGraphAnalysis, DominanceAnalysis};
use crate::error::{PipelineError, Result};
use crate::ir::{Module, Stage};
use crate::pass::{Invalidation, IterationPolicy, PassManager};
use crate::pipeline::{GateDecision, PassKind, PassRegistry, PipelineMode, PipelineOptions, StageGate};
use crate::transforms;

/// The diagnostic passes, in the order they run after mandatory inlining.
pub const DIAGNOSTIC_PASSES: &[PassKind] = &[
    PassKind::MandatoryInlining,
    PassKind::CapturePromotion,
    PassKind::AllocBoxToStack,
    PassKind::InOutDeshadowing,
    PassKind::NoReturnFolding,
    PassKind::DefiniteInitialization,
    PassKind::PredictableMemoryOpts,
    PassKind::DiagnosticConstantPropagation,
    PassKind::DiagnoseUnreachable,
    PassKind::DataFlowDiagnostics,
];

/// Makes generic code monomorphic before anything else looks at it.
pub const GENERICS_PASSES: &[PassKind] = &[PassKind::Linker, PassKind::GenericSpecializer];

/// The main optimization phase, run until it stops changing the module.
pub const SSA_PASSES: &[PassKind] = &[
    PassKind::SimplifyCfg,
    PassKind::AllocBoxToStack,
    PassKind::LowerAggregate,
    PassKind::Combine,
    PassKind::Sroa,
    PassKind::Mem2Reg,
    PassKind::PerformanceConstantPropagation,
    PassKind::Dce,
    PassKind::Cse,
    PassKind::Combine,
    PassKind::SimplifyCfg,
    PassKind::LoadStoreOpts,
    PassKind::CodeMotion,
    PassKind::EnumSimplification,
    PassKind::GlobalArcOpts,
    PassKind::Devirtualization,
    PassKind::GenericSpecializer,
    PassKind::Linker,
    PassKind::PerformanceInliner,
    PassKind::GlobalArcOpts,
];

/// Lowering. Inline caches only make sense at call sites that survived
/// devirtualization, so the two have to stay in this order.
pub const LOWERING_PASSES: &[PassKind] = &[
    PassKind::DeadFunctionElimination,
    PassKind::DeadObjectElimination,
    PassKind::GlobalOpt,
    PassKind::Devirtualization,
    PassKind::InlineCaches,
];

/// Registers the analyses that every pipeline manager provides.
pub fn register_core_analyses(manager: &mut PassManager) -> Result<()> {
    manager.register_analysis(CallGraphAnalysis)?;
    manager.register_analysis(AliasAnalysis)?;
    manager.register_analysis(DominanceAnalysis)
}

/// Builds and runs the two pipelines over modules.
///
/// The debug-serialization mode is decided once when the driver is created,
/// both pipelines branch on that same decision.
pub struct PipelineDriver<'r> {
    registry: &'r PassRegistry,
    options: PipelineOptions,
    mode: PipelineMode,
}

impl<'r> PipelineDriver<'r> {
    /// Creates a driver that builds passes out of `registry`.
    pub fn new(registry: &'r PassRegistry, options: &PipelineOptions) -> Self {
        Self {
            registry,
            options: *options,
            mode: PipelineMode::from_options(options),
        }
    }

    /// Gets the mode that both pipelines run in.
    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// Gets the options the driver was created with.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn manager(&self, kinds: &[PassKind]) -> Result<PassManager> {
        let mut manager = PassManager::new();

        register_core_analyses(&mut manager)?;

        for &kind in kinds {
            manager.add_boxed(self.registry.create(kind, &self.options)?);
        }

        Ok(manager)
    }

    fn run_phase(
        &self,
        module: &mut Module,
        manager: &mut PassManager,
        policy: IterationPolicy,
    ) -> Result<()> {
        let summary = manager.run(module, policy)?;

        log::debug!(
            "phase ran {} iteration(s) over `{}` (changed: {})",
            summary.iterations,
            module.name(),
            summary.changed
        );

        module.record_diagnostics(manager.take_diagnostics());

        Ok(())
    }

    /// Runs the diagnostic passes over a module, and marks it as canonical.
    ///
    /// Returns whether an error has been reported against the module. A module
    /// that is already canonical is left alone and `false` is returned.
    ///
    /// In debug-serialization mode only mandatory inlining runs, and the module
    /// stays at [`Stage::Raw`].
    pub fn run_diagnostic_pipeline(&self, module: &mut Module) -> Result<bool> {
        if StageGate::check(module) == GateDecision::Skip {
            return Ok(false);
        }

        if self.mode == PipelineMode::DebugSerialization {
            let mut manager = self.manager(&[PassKind::MandatoryInlining])?;

            self.run_phase(module, &mut manager, IterationPolicy::Once)?;

            return Ok(module.had_error());
        }

        let mut manager = self.manager(DIAGNOSTIC_PASSES)?;

        self.run_phase(module, &mut manager, IterationPolicy::Once)?;

        // canonical means "diagnosed", errors or not
        module.set_stage(Stage::Canonical);

        Ok(module.had_error())
    }

    /// Runs the optimization passes over a module.
    ///
    /// The module is expected to have been through
    /// [`Self::run_diagnostic_pipeline`] without errors. Diagnostics reported
    /// here are recorded on the module, only fatal problems are returned.
    pub fn run_optimization_pipeline(&self, module: &mut Module) -> Result<()> {
        if self.mode == PipelineMode::DebugSerialization {
            let mut manager = self.manager(&[PassKind::Linker])?;

            return self.run_phase(module, &mut manager, IterationPolicy::Once);
        }

        if self.options.ssa_iterations == 0 {
            return Err(PipelineError::Configuration(
                "the SSA phase needs at least one iteration".to_owned(),
            ));
        }

        let mut generics = self.manager(GENERICS_PASSES)?;
        let mut ssa = self.manager(SSA_PASSES)?;
        let mut lowering = self.manager(LOWERING_PASSES)?;
        let bound = IterationPolicy::UntilStable {
            max_iterations: self.options.ssa_iterations,
        };

        self.run_phase(module, &mut generics, IterationPolicy::Once)?;
        self.run_phase(module, &mut ssa, bound)?;
        self.run_phase(module, &mut lowering, IterationPolicy::Once)?;

        // lowering changed call sites behind the SSA manager's back
        ssa.invalidate_analysis(&Invalidation::All);
        self.run_phase(module, &mut ssa, IterationPolicy::Once)?;

        if module.invalidate_loader() {
            log::debug!("dropped the definition loader of `{}`", module.name());
        }

        let mut cleanup = self.manager(&[PassKind::DeadFunctionElimination])?;

        self.run_phase(module, &mut cleanup, IterationPolicy::Once)?;

        if self.options.print_inst_counts {
            let mut report = self.manager(&[PassKind::InstCount])?;

            self.run_phase(module, &mut report, IterationPolicy::Once)?;
        }

        if self.options.verify {
            transforms::verify_module(module).map_err(|errors| PipelineError::Verification {
                after: "optimization pipeline".to_owned(),
                errors,
            })?;
        }

        Ok(())
    }
}

/// Runs the diagnostic pipeline with the standard passes.
///
/// See [`PipelineDriver::run_diagnostic_pipeline`].
pub fn run_diagnostic_pipeline(module: &mut Module, options: &PipelineOptions) -> Result<bool> {
    let registry = PassRegistry::standard();

    PipelineDriver::new(&registry, options).run_diagnostic_pipeline(module)
}

/// Runs the optimization pipeline with the standard passes.
///
/// See [`PipelineDriver::run_optimization_pipeline`].
pub fn run_optimization_pipeline(module: &mut Module, options: &PipelineOptions) -> Result<()> {
    let registry = PassRegistry::standard();

    PipelineDriver::new(&registry, options).run_optimization_pipeline(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisCache, AnalysisKind};
    use crate::ir::*;
    use crate::pass::{ModuleTransformPass, PassResult};
    use crate::transforms::InstCountPass;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Fake {
        name: &'static str,
        log: Log,
        changes: bool,
    }

    impl ModuleTransformPass for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(&mut self, _: &mut Module, _: &AnalysisCache) -> PassResult {
            self.log.borrow_mut().push(self.name);

            PassResult::new(self.changes)
        }
    }

    fn recording(log: &Log, changing: &[PassKind]) -> PassRegistry {
        let mut registry = PassRegistry::new();

        for &kind in PassKind::ALL {
            let log = log.clone();
            let changes = changing.contains(&kind);

            registry.register(kind, move |_| {
                Box::new(Fake {
                    name: kind.name(),
                    log: log.clone(),
                    changes,
                })
            });
        }

        registry
    }

    // never changes anything and keeps every cached analysis
    struct Inert(&'static str);

    impl ModuleTransformPass for Inert {
        fn name(&self) -> &'static str {
            self.0
        }

        fn invalidates(&self) -> Invalidation {
            Invalidation::Nothing
        }

        fn run(&mut self, _: &mut Module, _: &AnalysisCache) -> PassResult {
            PassResult::unchanged()
        }
    }

    // records how many times the call graph had been computed when it ran
    struct CallGraphReader(Rc<RefCell<Vec<usize>>>);

    impl ModuleTransformPass for CallGraphReader {
        fn name(&self) -> &'static str {
            "call-graph-reader"
        }

        fn invalidates(&self) -> Invalidation {
            Invalidation::Nothing
        }

        fn run(&mut self, module: &mut Module, am: &AnalysisCache) -> PassResult {
            let _ = am.get::<CallGraphAnalysis>(module);

            self.0
                .borrow_mut()
                .push(am.computations(AnalysisKind::of::<CallGraphAnalysis>()));

            PassResult::unchanged()
        }
    }

    fn names(kinds: &[&[PassKind]]) -> Vec<&'static str> {
        kinds.iter().flat_map(|k| k.iter()).map(|k| k.name()).collect()
    }

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn canonical_modules_are_skipped() {
        init();

        let log = Log::default();
        let registry = recording(&log, &[]);
        let driver = PipelineDriver::new(&registry, &PipelineOptions::default());
        let mut module = Module::new("test");

        module.set_stage(Stage::Canonical);

        assert_eq!(driver.run_diagnostic_pipeline(&mut module), Ok(false));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn diagnostic_order() {
        init();

        let log = Log::default();
        let registry = recording(&log, &[]);
        let driver = PipelineDriver::new(&registry, &PipelineOptions::default());
        let mut module = Module::new("test");

        assert_eq!(driver.run_diagnostic_pipeline(&mut module), Ok(false));
        assert_eq!(*log.borrow(), names(&[DIAGNOSTIC_PASSES]));
        assert_eq!(module.stage(), Stage::Canonical);

        log.borrow_mut().clear();

        assert_eq!(driver.run_diagnostic_pipeline(&mut module), Ok(false));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn debug_serialization_diagnostics() {
        init();

        let log = Log::default();
        let registry = recording(&log, &[PassKind::MandatoryInlining]);
        let options = PipelineOptions::default().debug_serialization(true);
        let driver = PipelineDriver::new(&registry, &options);
        let mut module = Module::new("test");

        assert_eq!(driver.mode(), PipelineMode::DebugSerialization);
        assert_eq!(driver.run_diagnostic_pipeline(&mut module), Ok(false));
        assert_eq!(*log.borrow(), ["mandatory-inlining"]);
        assert_eq!(module.stage(), Stage::Raw);
    }

    #[test]
    fn debug_serialization_optimization() {
        init();

        let log = Log::default();
        let registry = recording(&log, &[]);
        let options = PipelineOptions::default().debug_serialization(true);
        let driver = PipelineDriver::new(&registry, &options);

        assert_eq!(driver.run_optimization_pipeline(&mut Module::new("test")), Ok(()));
        assert_eq!(*log.borrow(), ["linker"]);
    }

    #[test]
    fn optimization_phases() {
        init();

        let log = Log::default();
        let registry = recording(&log, &[]);
        let driver = PipelineDriver::new(&registry, &PipelineOptions::default());

        assert_eq!(driver.run_optimization_pipeline(&mut Module::new("test")), Ok(()));
        assert_eq!(
            *log.borrow(),
            names(&[
                GENERICS_PASSES,
                SSA_PASSES,
                LOWERING_PASSES,
                SSA_PASSES,
                &[PassKind::DeadFunctionElimination],
            ])
        );
    }

    #[test]
    fn ssa_rerun_recomputes_analyses() {
        init();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = PassRegistry::new();

        for &kind in PassKind::ALL {
            registry.register(kind, move |_| Box::new(Inert(kind.name())));
        }

        let reader = seen.clone();
        registry.register(PassKind::Sroa, move |_| Box::new(CallGraphReader(reader.clone())));

        let driver = PipelineDriver::new(&registry, &PipelineOptions::default());

        assert_eq!(driver.run_optimization_pipeline(&mut Module::new("test")), Ok(()));

        // the bounded run is stable after one iteration, nothing in it drops the
        // call graph, so only the rerun after lowering computes it again
        assert_eq!(*seen.borrow(), [1, 2]);
    }

    #[test]
    fn debug_serialization_keeps_dead_transparent_functions() {
        init();

        let module = || {
            let mut module = Module::new("test");
            let mut callee = FunctionBuilder::new("double", 1).private().transparent();
            let p = callee.param(0);
            let sum = callee.add(p, p);
            callee.ret(Some(sum));
            module.insert_function(callee.build());

            let mut main = FunctionBuilder::new("main", 1);
            let p = main.param(0);
            let x = main.call("double", &[p]);
            main.ret(Some(x));
            module.insert_function(main.build());

            module
        };

        let mut debug = module();
        let options = PipelineOptions::default().debug_serialization(true);

        assert_eq!(run_diagnostic_pipeline(&mut debug, &options), Ok(false));
        assert!(debug.function("double").is_some());

        let main = debug.function("main").unwrap().definition().unwrap();
        assert!(main.insts().iter().all(|inst| !matches!(inst, Inst::Call { .. })));

        let mut full = module();

        assert_eq!(run_diagnostic_pipeline(&mut full, &PipelineOptions::default()), Ok(false));
        assert!(full.function("double").is_none());
    }

    #[test]
    fn ssa_phase_is_bounded() {
        init();

        let log = Log::default();
        let registry = recording(&log, &[PassKind::Combine]);
        let count = |log: &Log| log.borrow().iter().filter(|n| **n == "combine").count();

        // `combine` appears twice in the SSA phase, three bounded iterations plus the rerun
        let driver = PipelineDriver::new(&registry, &PipelineOptions::default());
        assert_eq!(driver.run_optimization_pipeline(&mut Module::new("test")), Ok(()));
        assert_eq!(count(&log), 2 * 3 + 2);

        log.borrow_mut().clear();

        let driver = PipelineDriver::new(&registry, &PipelineOptions::default().ssa_iterations(5));
        assert_eq!(driver.run_optimization_pipeline(&mut Module::new("test")), Ok(()));
        assert_eq!(count(&log), 2 * 5 + 2);
    }

    #[test]
    fn zero_iterations_is_an_error() {
        let registry = recording(&Log::default(), &[]);
        let options = PipelineOptions::default().ssa_iterations(0);
        let driver = PipelineDriver::new(&registry, &options);

        assert!(matches!(
            driver.run_optimization_pipeline(&mut Module::new("test")),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn unbound_pass_is_an_error() {
        let registry = PassRegistry::new();
        let driver = PipelineDriver::new(&registry, &PipelineOptions::default());
        let mut module = Module::new("test");

        assert!(matches!(
            driver.run_diagnostic_pipeline(&mut module),
            Err(PipelineError::Configuration(_))
        ));
        assert_eq!(module.stage(), Stage::Raw);
    }

    #[test]
    fn reports_uninitialized_reads() {
        init();

        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("f", 0).returns_value();
        let slot = b.alloc_stack();
        let x = b.load(slot);
        b.ret(Some(x));
        module.insert_function(b.build());

        let options = PipelineOptions::default();

        assert_eq!(run_diagnostic_pipeline(&mut module, &options), Ok(true));
        assert_eq!(module.stage(), Stage::Canonical);

        let reported = module.diagnostics().len();

        assert_eq!(run_diagnostic_pipeline(&mut module, &options), Ok(false));
        assert_eq!(module.diagnostics().len(), reported);
        assert!(module.had_error());
    }

    #[test]
    fn inlining_exposes_overflow() {
        init();

        let mut module = Module::new("test");
        let mut add_one = FunctionBuilder::new("add_one", 1)
            .private()
            .transparent()
            .returns_value();
        let p = add_one.param(0);
        let one = add_one.iconst(1);
        let sum = add_one.add(p, one);
        add_one.ret(Some(sum));
        module.insert_function(add_one.build());

        let mut main = FunctionBuilder::new("main", 0).returns_value();
        let big = main.iconst(i64::MAX);
        let result = main.call("add_one", &[big]);
        main.ret(Some(result));
        module.insert_function(main.build());

        assert_eq!(
            run_diagnostic_pipeline(&mut module, &PipelineOptions::default()),
            Ok(true)
        );
        assert_eq!(module.function_names(), ["main"]);
        assert_eq!(module.diagnostics().error_count(), 1);
    }

    #[test]
    fn clean_module_is_untouched() {
        init();

        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("main", 0);
        let x = b.iconst(1);
        b.call_void("print", &[x]);
        b.ret(None);
        module.insert_function(b.build());
        module.insert_function(Function::declaration("print", FunctionAttrs::default()));
        module.set_stage(Stage::Canonical);

        let before = module.to_string();
        let options = PipelineOptions::default().verify(true);

        assert_eq!(run_optimization_pipeline(&mut module, &options), Ok(()));
        assert_eq!(module.to_string(), before);
        assert!(module.diagnostics().is_empty());
    }

    #[test]
    fn devirtualizes_specializes_and_inlines() {
        init();

        let mut module = Module::new("test");
        module.insert_class(Class::new("Circle", true).with_method("area", "circle_area"));

        let mut area = FunctionBuilder::new("circle_area", 1).private();
        let r = area.param(0);
        let three = area.iconst(3);
        let squared = area.mul(r, r);
        let scaled = area.mul(squared, three);
        area.ret(Some(scaled));
        module.insert_function(area.build());

        let mut id = FunctionBuilder::new("id", 1).private().generic();
        let p = id.param(0);
        id.ret(Some(p));
        module.insert_function(id.build());

        let mut main = FunctionBuilder::new("main", 1);
        let p = main.param(0);
        let v = main.call_virtual("Circle", "area", &[p]);
        let w = main.call_generic("id", "Int", &[v]);
        main.ret(Some(w));
        module.insert_function(main.build());

        let options = PipelineOptions::default().verify(true);

        assert_eq!(run_optimization_pipeline(&mut module, &options), Ok(()));
        assert_eq!(module.function_names(), ["circle_area", "main"]);

        let body = module.function("main").unwrap().definition().unwrap();
        assert!(body.insts().iter().all(|inst| !matches!(inst, Inst::Call { .. })));
        assert_eq!(body.len(), 4);
    }

    #[test]
    fn prints_inst_counts() {
        init();

        #[derive(Clone, Default)]
        struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

        impl io::Write for SharedBuffer {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);

                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let buffer = SharedBuffer::default();
        let sink = buffer.clone();
        let mut registry = PassRegistry::standard();

        registry.register(PassKind::InstCount, move |_| {
            Box::new(InstCountPass::with_writer(sink.clone()))
        });

        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("main", 0);
        b.ret(None);
        module.insert_function(b.build());

        let options = PipelineOptions::default().print_inst_counts(true);
        let driver = PipelineDriver::new(&registry, &options);

        assert_eq!(driver.run_optimization_pipeline(&mut module), Ok(()));
        assert_eq!(
            String::from_utf8(buffer.0.borrow().clone()).unwrap(),
            "module `test`: 1 instruction(s)\n  @main: 1\n"
        );
    }
}
