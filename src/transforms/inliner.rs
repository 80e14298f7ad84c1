//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{AnalysisCache, CallGraph, CallGraphAnalysis};
use crate::diagnostics::Diagnostics;
use crate::ir::*;
use crate::pass::{ModuleTransformPass, PassResult};
use crate::transforms::common;
use crate::utility::{SaHashMap, SaHashSet};

/// Replaces the call at `index` in `caller` with a copy of `callee`'s body.
///
/// Every value and slot in the callee gets a fresh counterpart in the caller,
/// the parameters become the call's arguments and the returned value replaces
/// the call's result. Only the code up to the callee's first terminator is
/// copied.
///
/// Returns `false` without touching the caller if the call can't be inlined,
/// i.e. the argument count doesn't match, the call's result is used but the
/// callee doesn't return a value, or the callee uses a value it never defines.
pub fn inline_call(caller: &mut Definition, index: usize, callee: &Definition) -> bool {
    let (dest, args) = match caller.insts().get(index) {
        Some(Inst::Call { dest, args, .. }) => (*dest, args.clone()),
        _ => return false,
    };

    if args.len() != callee.params().len() {
        return false;
    }

    let exit = common::first_terminator(callee).map(|i| &callee.insts()[i]);

    if dest.is_some() && !matches!(exit, Some(Inst::Return { value: Some(_) })) {
        return false;
    }

    // nothing in the caller can change until the copy is known to succeed
    if !self_contained(callee) {
        return false;
    }

    let mut values: SaHashMap<Value, Value> = callee
        .params()
        .iter()
        .copied()
        .zip(args.iter().copied())
        .collect();
    let mut slots = SaHashMap::<Slot, Slot>::default();
    let mut body = Vec::with_capacity(callee.len());
    let mut returned = None;

    for inst in callee.insts() {
        match inst {
            Inst::Return { value } => {
                returned = *value;
                break;
            }
            Inst::Unreachable => {
                body.push(Inst::Unreachable);
                break;
            }
            _ => {}
        }

        let mut copy = inst.clone();

        for operand in copy.operands_mut() {
            if let Some(&mapped) = values.get(&*operand) {
                *operand = mapped;
            }
        }

        if let Some(slot) = copy.slot_mut() {
            *slot = *slots.entry(*slot).or_insert_with(|| caller.make_slot());
        }

        if let Some(result) = copy.result_mut() {
            let fresh = caller.make_value();

            values.insert(*result, fresh);
            *result = fresh;
        }

        body.push(copy);
    }

    let returned = returned.and_then(|value| values.get(&value).copied());

    caller.insts_mut().splice(index..=index, body);

    if let (Some(dest), Some(returned)) = (dest, returned) {
        caller.replace_all_uses(dest, returned);
    }

    true
}

// checks that every value used before the first terminator (including the
// returned one) is a parameter or defined earlier in the body
fn self_contained(callee: &Definition) -> bool {
    let mut defined: SaHashSet<Value> = callee.params().iter().copied().collect();

    for inst in callee.insts() {
        if inst.operands().iter().any(|operand| !defined.contains(operand)) {
            return false;
        }

        if inst.is_terminator() {
            return true;
        }

        if let Some(result) = inst.result() {
            defined.insert(result);
        }
    }

    true
}

fn direct_target(inst: &Inst) -> Option<&str> {
    match inst {
        Inst::Call {
            callee: Callee::Direct(name),
            ..
        } => Some(name),
        _ => None,
    }
}

// checks if `func` can reach itself by only going through functions in `within`
fn cycles_within(graph: &CallGraph, func: &str, within: &SaHashMap<String, Definition>) -> bool {
    let mut seen = SaHashSet::<&str>::default();
    let mut worklist: Vec<&str> = graph.callees(func).iter().map(String::as_str).collect();

    while let Some(next) = worklist.pop() {
        if next == func {
            return true;
        }

        if within.contains_key(next) && seen.insert(next) {
            worklist.extend(graph.callees(next).iter().map(String::as_str));
        }
    }

    false
}

/// Inlines every call to a `transparent` function.
///
/// Transparent functions have to be inlined before diagnostics run, a transparent
/// function that (directly or indirectly) calls itself can't be inlined and is
/// an error.
///
/// Once everything has been inlined, private transparent functions have no
/// reason to exist and are removed unless `cleanup` is disabled.
pub struct MandatoryInliningPass {
    cleanup: bool,
}

impl MandatoryInliningPass {
    /// Creates the pass. `cleanup` controls whether dead transparent
    /// functions are removed afterwards.
    pub fn new(cleanup: bool) -> Self {
        Self { cleanup }
    }

    fn remove_dead_transparent(module: &mut Module) -> usize {
        let mut used = SaHashSet::<String>::default();

        for class in module.classes() {
            used.extend(class.implementations().map(str::to_owned));
        }

        for def in module.functions().filter_map(Function::definition) {
            for inst in def.insts() {
                if let Inst::Call { callee, .. } = inst {
                    used.extend(callee.static_target().map(str::to_owned));
                }
            }
        }

        module.retain_functions(|f| {
            let dead = f.attrs().transparent
                && f.linkage() == Linkage::Private
                && !used.contains(f.name());

            !dead
        })
    }
}

impl ModuleTransformPass for MandatoryInliningPass {
    fn name(&self) -> &'static str {
        "mandatory-inlining"
    }

    fn run(&mut self, module: &mut Module, am: &AnalysisCache) -> PassResult {
        let graph = am.get::<CallGraphAnalysis>(module);
        let mut diagnostics = Diagnostics::new();
        let mut transparent: SaHashMap<String, Definition> = module
            .functions()
            .filter(|f| f.attrs().transparent)
            .filter_map(|f| Some((f.name().to_owned(), f.definition()?.clone())))
            .collect();

        // walk in module order so that the diagnostics come out deterministically
        let recursive: Vec<String> = module
            .functions()
            .map(Function::name)
            .filter(|name| {
                transparent.contains_key(*name) && cycles_within(&graph, name, &transparent)
            })
            .map(str::to_owned)
            .collect();

        drop(graph);

        for name in recursive {
            diagnostics.error(&name, "transparent function calls itself and can't be inlined");
            transparent.remove(&name);
        }

        let mut changed = false;

        for name in module.function_names() {
            let def = match module.function_mut(&name).and_then(Function::definition_mut) {
                Some(def) => def,
                None => continue,
            };

            let mut start = 0;

            loop {
                let found = def.insts()[start..].iter().enumerate().find_map(|(offset, inst)| {
                    direct_target(inst)
                        .filter(|t| *t != name && transparent.contains_key(*t))
                        .map(|t| (offset, t.to_owned()))
                });

                let (i, target) = match found {
                    Some((offset, target)) => (start + offset, target),
                    None => break,
                };

                if inline_call(def, i, &transparent[&target]) {
                    log::trace!("inlined transparent `@{target}` into `@{name}`");

                    // the inlined body may contain more transparent calls
                    start = i;
                    changed = true;
                } else {
                    diagnostics.error(&name, format!("call to transparent `@{target}` can't be inlined"));
                    start = i + 1;
                }
            }
        }

        if self.cleanup {
            changed |= Self::remove_dead_transparent(module) != 0;
        }

        PassResult::new(changed).with_diagnostics(diagnostics)
    }
}

/// Inlines small functions into their callers.
///
/// A callee is only inlined if it has at most `threshold` instructions, isn't
/// recursive, isn't generic (those have to be specialized first) and returns
/// normally. Each run inlines the call sites that existed when it started,
/// calls exposed by inlining are picked up by the next run.
pub struct PerformanceInlinerPass {
    threshold: usize,
}

impl PerformanceInlinerPass {
    /// Creates an inliner that inlines callees with at most `threshold` instructions.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }
}

impl Default for PerformanceInlinerPass {
    fn default() -> Self {
        Self::new(12)
    }
}

impl ModuleTransformPass for PerformanceInlinerPass {
    fn name(&self) -> &'static str {
        "performance-inliner"
    }

    fn run(&mut self, module: &mut Module, am: &AnalysisCache) -> PassResult {
        let graph = am.get::<CallGraphAnalysis>(module);
        let candidates: SaHashMap<String, Definition> = module
            .functions()
            .filter(|f| !f.attrs().generic && !f.attrs().noreturn)
            .filter(|f| !graph.is_recursive(f.name()))
            .filter_map(|f| Some((f.name().to_owned(), f.definition()?)))
            .filter(|(_, def)| def.len() <= self.threshold)
            .map(|(name, def)| (name, def.clone()))
            .collect();

        drop(graph);

        let mut changed = false;

        for name in module.function_names() {
            let def = match module.function_mut(&name).and_then(Function::definition_mut) {
                Some(def) => def,
                None => continue,
            };

            let sites: Vec<(usize, String)> = def
                .insts()
                .iter()
                .enumerate()
                .filter_map(|(i, inst)| match inst {
                    Inst::Call {
                        callee: Callee::Direct(target),
                        substitution: None,
                        ..
                    } if *target != name && candidates.contains_key(target) => {
                        Some((i, target.clone()))
                    }
                    _ => None,
                })
                .collect();

            // back to front, so that inlining doesn't shift the indices we still need
            for (i, target) in sites.into_iter().rev() {
                if inline_call(def, i, &candidates[&target]) {
                    log::trace!("inlined `@{target}` into `@{name}`");

                    changed = true;
                }
            }
        }

        PassResult::new(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::verify_module;

    fn cache() -> AnalysisCache {
        let mut am = AnalysisCache::new();

        am.register(CallGraphAnalysis).unwrap();

        am
    }

    fn add_one(transparent: bool) -> Function {
        let mut b = FunctionBuilder::new("add_one", 1).private();
        if transparent {
            b = b.transparent();
        }

        let p = b.param(0);
        let one = b.iconst(1);
        let slot = b.alloc_stack();
        b.store(slot, one);
        let loaded = b.load(slot);
        let sum = b.add(p, loaded);
        b.ret(Some(sum));
        b.build()
    }

    fn caller() -> Function {
        let mut b = FunctionBuilder::new("main", 1);
        let p = b.param(0);
        let x = b.call("add_one", &[p]);
        let y = b.call("add_one", &[x]);
        b.ret(Some(y));
        b.build()
    }

    #[test]
    fn inlines_and_cleans_up_transparent() {
        let mut module = Module::new("test");
        module.insert_function(add_one(true));
        module.insert_function(caller());

        let result = MandatoryInliningPass::new(true).run(&mut module, &cache());

        assert!(result.changed());
        assert!(result.diagnostics().is_empty());
        assert!(module.function("add_one").is_none());

        let def = module.function("main").unwrap().definition().unwrap();
        assert!(def.insts().iter().all(|inst| direct_target(inst).is_none()));
        assert_eq!(def.slot_count(), 2);
        assert_eq!(verify_module(&module), Ok(()));
    }

    #[test]
    fn keeps_dead_transparent_without_cleanup() {
        let mut module = Module::new("test");
        module.insert_function(add_one(true));
        module.insert_function(caller());

        let result = MandatoryInliningPass::new(false).run(&mut module, &cache());

        assert!(result.changed());
        assert!(module.function("add_one").is_some());
    }

    #[test]
    fn recursive_transparent_is_an_error() {
        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("loop", 0).transparent();
        b.call_void("loop", &[]);
        b.ret(None);
        module.insert_function(b.build());

        let mut main = FunctionBuilder::new("main", 0);
        main.call_void("loop", &[]);
        main.ret(None);
        module.insert_function(main.build());

        let result = MandatoryInliningPass::new(true).run(&mut module, &cache());

        assert!(!result.changed());
        assert_eq!(result.diagnostics().error_count(), 1);
    }

    #[test]
    fn performance_inliner_skips_recursion() {
        let mut module = Module::new("test");
        let mut rec = FunctionBuilder::new("rec", 0);
        rec.call_void("rec", &[]);
        rec.ret(None);
        module.insert_function(rec.build());
        module.insert_function(add_one(false));

        let mut main = FunctionBuilder::new("main", 1);
        let p = main.param(0);
        main.call_void("rec", &[]);
        let x = main.call("add_one", &[p]);
        main.ret(Some(x));
        module.insert_function(main.build());

        let am = cache();
        let mut pass = PerformanceInlinerPass::default();

        assert!(pass.run(&mut module, &am).changed());

        let def = module.function("main").unwrap().definition().unwrap();
        assert_eq!(direct_target(&def.insts()[0]), Some("rec"));
        assert_eq!(def.insts().iter().filter_map(direct_target).count(), 1);
        assert_eq!(verify_module(&module), Ok(()));
    }

    #[test]
    fn shape_mismatch() {
        let mut callee = FunctionBuilder::new("nothing", 0);
        callee.ret(None);
        let callee = callee.build();

        let mut b = FunctionBuilder::new("main", 0);
        let x = b.call("nothing", &[]);
        b.ret(Some(x));
        let mut main = b.build();

        let def = main.definition_mut().unwrap();
        let before = def.clone();

        assert!(!inline_call(def, 0, callee.definition().unwrap()));
        assert_eq!(*def, before);
    }

    #[test]
    fn broken_callee_leaves_caller_alone() {
        let mut body = Definition::new(0);
        let slot = body.make_slot();
        let fresh = body.make_value();
        let stray = body.make_value();
        let sum = body.make_value();

        body.push(Inst::AllocStack { slot });
        body.push(Inst::Const { dest: fresh, value: 1 });
        body.push(Inst::Binary {
            dest: sum,
            op: BinaryOp::Add,
            lhs: fresh,
            rhs: stray,
        });
        body.push(Inst::Return { value: None });

        let mut b = FunctionBuilder::new("main", 0);
        b.call_void("broken", &[]);
        b.ret(None);
        let mut main = b.build();

        let def = main.definition_mut().unwrap();
        let before = def.clone();

        assert!(!inline_call(def, 0, &body));
        assert_eq!(def.value_count(), before.value_count());
        assert_eq!(def.slot_count(), before.slot_count());
        assert_eq!(*def, before);
    }
}
