//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{AnalysisCache, DominanceAnalysis};
use crate::diagnostics::Diagnostics;
use crate::ir::*;
use crate::pass::{FunctionTransformPass, Invalidation, ModuleTransformPass, PassResult};
use crate::transforms::common;
use crate::utility::SaHashSet;

/// Reports every read of memory that hasn't been written to yet.
///
/// ```none
/// $0 = alloc_stack
/// %0 = load $0        ; error: `$0` is read before it is initialized
/// ```
///
/// Capturing a slot by reference counts as a read, since the closure
/// can read it whenever it wants.
pub struct DefiniteInitializationPass;

impl FunctionTransformPass for DefiniteInitializationPass {
    fn name(&self) -> &'static str {
        "definite-initialization"
    }

    fn invalidates(&self) -> Invalidation {
        Invalidation::Nothing
    }

    fn run(&mut self, func: &mut Function, diagnostics: &mut Diagnostics) -> bool {
        let mut initialized = SaHashSet::<Slot>::default();
        let name = func.name();

        for inst in func.definition().into_iter().flat_map(Definition::insts) {
            match inst {
                Inst::Store { slot, .. } => {
                    initialized.insert(*slot);
                }
                Inst::Load { slot, .. } if !initialized.contains(slot) => {
                    diagnostics.error(name, format!("`{slot}` is read before it is initialized"));
                }
                Inst::Capture { slot, .. } if !initialized.contains(slot) => {
                    diagnostics.error(
                        name,
                        format!("`{slot}` is captured before it is initialized"),
                    );
                }
                _ => {}
            }
        }

        false
    }
}

/// Removes code that can never execute, and warns about it.
pub struct DiagnoseUnreachablePass;

impl FunctionTransformPass for DiagnoseUnreachablePass {
    fn name(&self) -> &'static str {
        "diagnose-unreachable"
    }

    fn run(&mut self, func: &mut Function, diagnostics: &mut Diagnostics) -> bool {
        let name = func.name().to_owned();
        let removed = func
            .definition_mut()
            .map_or(0, common::truncate_after_terminator);

        if removed != 0 {
            diagnostics.warning(&name, format!("{removed} instruction(s) will never be executed"));
        }

        removed != 0
    }
}

/// Checks that functions return the way they are declared to.
///
/// A function marked as returning a value must end in a `ret` with a value (or
/// trap), and a `noreturn` function must never `ret` at all.
pub struct DataFlowDiagnosticsPass;

impl FunctionTransformPass for DataFlowDiagnosticsPass {
    fn name(&self) -> &'static str {
        "data-flow-diagnostics"
    }

    fn invalidates(&self) -> Invalidation {
        Invalidation::Nothing
    }

    fn run(&mut self, func: &mut Function, diagnostics: &mut Diagnostics) -> bool {
        let attrs = func.attrs();
        let def = match func.definition() {
            Some(def) => def,
            None => return false,
        };

        let exit = common::first_terminator(def).map(|i| &def.insts()[i]);

        match exit {
            None if attrs.returns_value => diagnostics.error(
                func.name(),
                "missing return in a function expected to return a value",
            ),
            None if attrs.noreturn => diagnostics.error(
                func.name(),
                "function declared `noreturn` can fall off its end",
            ),
            Some(Inst::Return { .. }) if attrs.noreturn => diagnostics.error(
                func.name(),
                "function declared `noreturn` returns to its caller",
            ),
            Some(Inst::Return { value: None }) if attrs.returns_value => diagnostics.error(
                func.name(),
                "function expected to return a value returns nothing",
            ),
            _ => {}
        }

        false
    }
}

/// Marks the code after a call to a `noreturn` function as unreachable.
///
/// ```none
/// call @abort()
/// %1 = iconst 5      ; `unreachable` is inserted right before this
/// ```
pub struct NoReturnFoldingPass;

impl ModuleTransformPass for NoReturnFoldingPass {
    fn name(&self) -> &'static str {
        "no-return-folding"
    }

    fn invalidates(&self) -> Invalidation {
        Invalidation::only::<DominanceAnalysis>()
    }

    fn run(&mut self, module: &mut Module, _: &AnalysisCache) -> PassResult {
        let noreturn: SaHashSet<String> = module
            .functions()
            .filter(|f| f.attrs().noreturn)
            .map(|f| f.name().to_owned())
            .collect();

        if noreturn.is_empty() {
            return PassResult::unchanged();
        }

        let mut changed = false;

        for def in module.functions_mut().filter_map(Function::definition_mut) {
            let insts = def.insts_mut();
            let mut i = 0;

            while i < insts.len() {
                let calls_noreturn = match &insts[i] {
                    Inst::Call { callee, .. } => callee
                        .static_target()
                        .map_or(false, |target| noreturn.contains(target)),
                    _ => false,
                };

                if calls_noreturn && insts.get(i + 1) != Some(&Inst::Unreachable) {
                    insts.insert(i + 1, Inst::Unreachable);
                    changed = true;
                }

                i += 1;
            }
        }

        PassResult::new(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::verify_module;

    fn run(pass: &mut impl FunctionTransformPass, func: &mut Function) -> (bool, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let changed = pass.run(func, &mut diagnostics);

        (changed, diagnostics)
    }

    #[test]
    fn uninitialized_reads() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let early = b.alloc_stack();
        let fine = b.alloc_box();
        b.load(early);
        b.store(fine, p);
        b.load(fine);
        b.capture(early);
        b.ret(None);

        let (changed, diagnostics) = run(&mut DefiniteInitializationPass, &mut b.build());

        assert!(!changed);
        assert_eq!(diagnostics.error_count(), 2);
    }

    #[test]
    fn unreachable_code() {
        let mut b = FunctionBuilder::new("f", 0);
        b.ret(None);
        b.iconst(1);
        b.unreachable();

        let mut f = b.build();
        let (changed, diagnostics) = run(&mut DiagnoseUnreachablePass, &mut f);

        assert!(changed);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(f.definition().unwrap().len(), 1);
        assert!(!run(&mut DiagnoseUnreachablePass, &mut f).0);
    }

    #[test]
    fn missing_returns() {
        let mut falls_off = FunctionBuilder::new("a", 0).returns_value();
        falls_off.iconst(1);

        let mut empty_ret = FunctionBuilder::new("b", 0).returns_value();
        empty_ret.ret(None);

        let mut returns = FunctionBuilder::new("c", 0).noreturn();
        returns.ret(None);

        let mut traps = FunctionBuilder::new("d", 0).returns_value();
        traps.unreachable();

        let mut pass = DataFlowDiagnosticsPass;

        assert_eq!(run(&mut pass, &mut falls_off.build()).1.error_count(), 1);
        assert_eq!(run(&mut pass, &mut empty_ret.build()).1.error_count(), 1);
        assert_eq!(run(&mut pass, &mut returns.build()).1.error_count(), 1);
        assert!(run(&mut pass, &mut traps.build()).1.is_empty());
    }

    #[test]
    fn folds_noreturn_calls() {
        let mut module = Module::new("test");
        let mut abort = FunctionBuilder::new("abort", 0).noreturn();
        abort.unreachable();

        let mut main = FunctionBuilder::new("main", 0);
        main.call_void("abort", &[]);
        main.iconst(1);
        main.ret(None);

        module.insert_function(abort.build());
        module.insert_function(main.build());

        let am = AnalysisCache::new();
        let mut pass = NoReturnFoldingPass;

        assert!(pass.run(&mut module, &am).changed());
        assert!(!pass.run(&mut module, &am).changed());

        let def = module.function("main").unwrap().definition().unwrap();
        assert_eq!(def.insts()[1], Inst::Unreachable);
        assert_eq!(verify_module(&module), Ok(()));
    }
}
