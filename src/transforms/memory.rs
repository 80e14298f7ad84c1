//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{AliasAnalysis, AnalysisCache};
use crate::diagnostics::Diagnostics;
use crate::ir::*;
use crate::pass::{FunctionTransformPass, Invalidation, ModuleTransformPass, PassResult};
use crate::transforms::common::{self, Replacements};
use crate::utility::{SaHashMap, SaHashSet};
use std::mem;

/// Turns by-reference captures into by-value captures when the captured
/// slot can't change after the capture.
///
/// ```none
/// store %0 to $0
/// %1 = capture $0           ; becomes `%1 = capture_value %0`
/// ```
pub struct CapturePromotionPass;

impl FunctionTransformPass for CapturePromotionPass {
    fn name(&self) -> &'static str {
        "capture-promotion"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let mut known = SaHashMap::<Slot, Value>::default();
        let mut promoted = Vec::new();

        for (i, inst) in def.insts().iter().enumerate() {
            match inst {
                Inst::Store { slot, value } => {
                    known.insert(*slot, *value);
                }
                Inst::Capture { dest, slot } => {
                    // a promoted capture has to see every write the slot will ever get
                    let written_later = def.insts()[i + 1..]
                        .iter()
                        .any(|later| matches!(later, Inst::Store { slot: s, .. } if s == slot));

                    match known.get(slot) {
                        Some(&value) if !written_later => promoted.push((i, *dest, value)),
                        _ => {}
                    }

                    known.remove(slot);
                }
                _ => {}
            }
        }

        for &(i, dest, value) in promoted.iter() {
            def.insts_mut()[i] = Inst::CaptureValue { dest, value };
        }

        !promoted.is_empty()
    }
}

/// Moves heap boxes that never escape their function onto the stack.
pub struct AllocBoxToStackPass;

impl ModuleTransformPass for AllocBoxToStackPass {
    fn name(&self) -> &'static str {
        "alloc-box-to-stack"
    }

    fn invalidates(&self) -> Invalidation {
        Invalidation::only::<AliasAnalysis>()
    }

    fn run(&mut self, module: &mut Module, am: &AnalysisCache) -> PassResult {
        let alias = am.get::<AliasAnalysis>(module);
        let mut changed = false;
        let mut rewrites = Vec::new();

        for func in module.functions() {
            for (i, inst) in func.definition().into_iter().flat_map(Definition::insts).enumerate() {
                if let Inst::AllocBox { slot } = inst {
                    if !alias.may_escape(func.name(), *slot) {
                        rewrites.push((func.name().to_owned(), i, *slot));
                    }
                }
            }
        }

        drop(alias);

        for (name, i, slot) in rewrites {
            if let Some(def) = module.function_mut(&name).and_then(Function::definition_mut) {
                log::trace!("promoting `{slot}` in `@{name}` to the stack");

                def.insts_mut()[i] = Inst::AllocStack { slot };
                changed = true;
            }
        }

        PassResult::new(changed)
    }
}

/// Removes stack copies of in-out arguments.
///
/// ```none
/// %1 = load $0
/// $1 = alloc_stack
/// store %1 to $1
/// %2 = load $1          ; becomes `%2 = load $0`
/// ```
///
/// This is only valid while the original slot isn't written to (or captured)
/// after the copy is made.
pub struct InOutDeshadowingPass;

impl InOutDeshadowingPass {
    // finds the single store into `shadow` and the slot it copies from
    fn shadow_of(def: &Definition, shadow: Slot, alloc: usize) -> Option<(usize, Slot)> {
        let insts = def.insts();
        let mut store = None;

        for (i, inst) in insts.iter().enumerate().skip(alloc + 1) {
            match inst {
                Inst::Store { slot, value } if *slot == shadow => {
                    if store.is_some() {
                        return None;
                    }

                    store = Some((i, *value));
                }
                Inst::Load { slot, .. } if *slot == shadow && store.is_none() => return None,
                Inst::Capture { slot, .. } if *slot == shadow => return None,
                _ => {}
            }
        }

        let (store, value) = store?;
        let copy = def.defining_index(value)?;
        let original = match &insts[copy] {
            Inst::Load { slot, .. } if *slot != shadow => *slot,
            _ => return None,
        };

        // the original can't change at any point after the copy was read,
        // and a captured original can change whenever the closure runs
        let clobbered = insts.iter().enumerate().any(|(i, inst)| match inst {
            Inst::Store { slot, .. } => *slot == original && i > copy,
            Inst::Capture { slot, .. } => *slot == original,
            _ => false,
        });

        (!clobbered).then_some((store, original))
    }
}

impl FunctionTransformPass for InOutDeshadowingPass {
    fn name(&self) -> &'static str {
        "in-out-deshadowing"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let mut changed = false;

        loop {
            let view: &Definition = def;
            let found = view.insts().iter().enumerate().find_map(|(i, inst)| match inst {
                Inst::AllocStack { slot } => Self::shadow_of(view, *slot, i)
                    .map(|(store, original)| (i, store, *slot, original)),
                _ => None,
            });

            let (alloc, store, shadow, original) = match found {
                Some(found) => found,
                None => break changed,
            };

            for inst in def.insts_mut().iter_mut() {
                if let Inst::Load { slot, .. } = inst {
                    if *slot == shadow {
                        *slot = original;
                    }
                }
            }

            // `store` always comes after `alloc`
            def.insts_mut().remove(store);
            def.insts_mut().remove(alloc);
            changed = true;
        }
    }
}

/// Forwards stored values to later loads of the same slot.
pub struct PredictableMemoryOptsPass;

impl FunctionTransformPass for PredictableMemoryOptsPass {
    fn name(&self) -> &'static str {
        "predictable-memory-opts"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        func.definition_mut().map_or(false, common::forward_stores)
    }
}

/// Forwards stores to loads like [`PredictableMemoryOptsPass`], and also
/// removes stores that are overwritten before anything can read them.
pub struct LoadStoreOptsPass;

impl LoadStoreOptsPass {
    fn remove_dead_stores(def: &mut Definition) -> bool {
        let captured = common::captured_slots(def);
        let mut pending = SaHashMap::<Slot, usize>::default();
        let mut dead = SaHashSet::<usize>::default();

        for (i, inst) in def.insts().iter().enumerate() {
            match inst {
                Inst::Store { slot, .. } if !captured.contains(slot) => {
                    if let Some(previous) = pending.insert(*slot, i) {
                        dead.insert(previous);
                    }
                }
                Inst::Load { slot, .. } => {
                    pending.remove(slot);
                }
                _ => {}
            }
        }

        if dead.is_empty() {
            return false;
        }

        let old = mem::take(def.insts_mut());

        def.insts_mut().extend(
            old.into_iter()
                .enumerate()
                .filter(|(i, _)| !dead.contains(i))
                .map(|(_, inst)| inst),
        );

        true
    }
}

impl FunctionTransformPass for LoadStoreOptsPass {
    fn name(&self) -> &'static str {
        "load-store-opts"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let forwarded = common::forward_stores(def);

        Self::remove_dead_stores(def) | forwarded
    }
}

/// Promotes stack slots to SSA values.
///
/// A slot is promoted if it doesn't escape and every load is preceded by
/// a store, at which point every load is replaced by the most recent store
/// and the slot disappears entirely.
pub struct Mem2RegPass;

impl Mem2RegPass {
    fn promotable(def: &Definition, slot: Slot) -> bool {
        let mut stored = false;

        for inst in def.insts() {
            match inst {
                Inst::Store { slot: s, .. } if *s == slot => stored = true,
                Inst::Load { slot: s, .. } if *s == slot && !stored => return false,
                _ => {}
            }
        }

        true
    }

    fn promote(def: &mut Definition, promoted: &SaHashSet<Slot>) {
        let mut current = SaHashMap::<Slot, Value>::default();
        let mut replacements = Replacements::new();
        let old = mem::take(def.insts_mut());

        for mut inst in old {
            replacements.apply(&mut inst);

            match &inst {
                Inst::AllocStack { slot } if promoted.contains(slot) => continue,
                Inst::Store { slot, value } if promoted.contains(slot) => {
                    current.insert(*slot, *value);

                    continue;
                }
                Inst::Load { dest, slot } if promoted.contains(slot) => {
                    if let Some(&value) = current.get(slot) {
                        replacements.replace(*dest, value);

                        continue;
                    }
                }
                _ => {}
            }

            def.push(inst);
        }
    }
}

impl ModuleTransformPass for Mem2RegPass {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, module: &mut Module, am: &AnalysisCache) -> PassResult {
        let alias = am.get::<AliasAnalysis>(module);
        let mut work = Vec::new();

        for func in module.functions() {
            let def = match func.definition() {
                Some(def) => def,
                None => continue,
            };

            let promoted: SaHashSet<Slot> = def
                .insts()
                .iter()
                .filter_map(|inst| match inst {
                    Inst::AllocStack { slot } => Some(*slot),
                    _ => None,
                })
                .filter(|slot| !alias.may_escape(func.name(), *slot))
                .filter(|slot| Self::promotable(def, *slot))
                .collect();

            if !promoted.is_empty() {
                work.push((func.name().to_owned(), promoted));
            }
        }

        drop(alias);

        let changed = !work.is_empty();

        for (name, promoted) in work {
            if let Some(def) = module.function_mut(&name).and_then(Function::definition_mut) {
                log::trace!("promoting {} slot(s) in `@{name}`", promoted.len());

                Self::promote(def, &promoted);
            }
        }

        PassResult::new(changed)
    }
}

/// Removes slots that are written to but never read.
pub struct DeadObjectEliminationPass;

impl FunctionTransformPass for DeadObjectEliminationPass {
    fn name(&self) -> &'static str {
        "dead-object-elimination"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let read: SaHashSet<Slot> = def
            .insts()
            .iter()
            .filter_map(|inst| match inst {
                Inst::Load { slot, .. } | Inst::Capture { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect();

        let before = def.len();

        def.insts_mut().retain(|inst| match inst {
            Inst::AllocBox { slot } | Inst::AllocStack { slot } | Inst::Store { slot, .. } => {
                read.contains(slot)
            }
            _ => true,
        });

        def.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_fn(pass: &mut impl FunctionTransformPass, f: &mut Function) -> bool {
        pass.run(f, &mut Diagnostics::new())
    }

    fn opcodes(f: &Function) -> Vec<&'static str> {
        f.definition()
            .unwrap()
            .insts()
            .iter()
            .map(Inst::opcode)
            .collect()
    }

    fn alias_cache() -> AnalysisCache {
        let mut am = AnalysisCache::new();

        am.register(AliasAnalysis).unwrap();

        am
    }

    #[test]
    fn capture_promotion() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let frozen = b.alloc_box();
        let mutated = b.alloc_box();
        b.store(frozen, p);
        b.store(mutated, p);
        b.capture(frozen);
        b.capture(mutated);
        b.store(mutated, p);
        b.ret(None);

        let mut f = b.build();

        assert!(run_fn(&mut CapturePromotionPass, &mut f));
        assert_eq!(opcodes(&f)[4..6], ["capture_value", "capture"]);
        assert!(!run_fn(&mut CapturePromotionPass, &mut f));
    }

    #[test]
    fn box_to_stack() {
        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let local = b.alloc_box();
        let escaping = b.alloc_box();
        b.store(local, p);
        b.store(escaping, p);
        let ctx = b.capture(escaping);
        b.ret(Some(ctx));
        module.insert_function(b.build());

        let am = alias_cache();

        assert!(AllocBoxToStackPass.run(&mut module, &am).changed());
        assert_eq!(
            opcodes(module.function("f").unwrap())[..2],
            ["alloc_stack", "alloc_box"]
        );
    }

    #[test]
    fn deshadowing() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let inout = b.alloc_stack();
        b.store(inout, p);
        let copy = b.load(inout);
        let shadow = b.alloc_stack();
        b.store(shadow, copy);
        let x = b.load(shadow);
        b.ret(Some(x));

        let mut f = b.build();

        assert!(run_fn(&mut InOutDeshadowingPass, &mut f));
        assert_eq!(opcodes(&f), ["alloc_stack", "store", "load", "load", "ret"]);

        let def = f.definition().unwrap();
        assert_eq!(def.insts()[3], Inst::Load { dest: x, slot: inout });
    }

    #[test]
    fn deshadowing_needs_unchanged_original() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let inout = b.alloc_stack();
        b.store(inout, p);
        let copy = b.load(inout);
        let shadow = b.alloc_stack();
        b.store(shadow, copy);
        let one = b.iconst(1);
        b.store(inout, one);
        let x = b.load(shadow);
        b.ret(Some(x));

        let mut f = b.build();

        assert!(!run_fn(&mut InOutDeshadowingPass, &mut f));
    }

    #[test]
    fn deshadowing_sees_writes_before_the_shadow_store() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let inout = b.alloc_stack();
        b.store(inout, p);
        let copy = b.load(inout);
        let one = b.iconst(1);
        b.store(inout, one);
        let shadow = b.alloc_stack();
        b.store(shadow, copy);
        let x = b.load(shadow);
        b.ret(Some(x));

        let mut f = b.build();
        let before = f.clone();

        assert!(!run_fn(&mut InOutDeshadowingPass, &mut f));
        assert_eq!(f, before);
    }

    #[test]
    fn deshadowing_rejects_captured_original() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let inout = b.alloc_stack();
        b.store(inout, p);
        let _closure = b.capture(inout);
        let copy = b.load(inout);
        let shadow = b.alloc_stack();
        b.store(shadow, copy);
        let x = b.load(shadow);
        b.ret(Some(x));

        let mut f = b.build();

        assert!(!run_fn(&mut InOutDeshadowingPass, &mut f));
    }

    #[test]
    fn dead_stores() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let slot = b.alloc_stack();
        let one = b.iconst(1);
        b.store(slot, one);
        b.store(slot, p);
        let x = b.load(slot);
        b.ret(Some(x));

        let mut f = b.build();

        assert!(run_fn(&mut LoadStoreOptsPass, &mut f));
        assert_eq!(opcodes(&f), ["alloc_stack", "iconst", "store", "ret"]);
        assert_eq!(
            f.definition().unwrap().insts()[3],
            Inst::Return { value: Some(p) }
        );
    }

    #[test]
    fn mem2reg() {
        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let promoted = b.alloc_stack();
        let uninit = b.alloc_stack();
        b.store(promoted, p);
        let x = b.load(promoted);
        let y = b.load(uninit);
        let sum = b.add(x, y);
        b.store(promoted, sum);
        let z = b.load(promoted);
        b.ret(Some(z));
        module.insert_function(b.build());

        let am = alias_cache();

        assert!(Mem2RegPass.run(&mut module, &am).changed());

        let f = module.function("f").unwrap();
        assert_eq!(opcodes(f), ["alloc_stack", "load", "add", "ret"]);
        assert_eq!(f.definition().unwrap().insts()[3], Inst::Return { value: Some(sum) });
    }

    #[test]
    fn dead_objects() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let dead = b.alloc_box();
        let live = b.alloc_stack();
        b.store(dead, p);
        b.store(live, p);
        let x = b.load(live);
        b.ret(Some(x));

        let mut f = b.build();

        assert!(run_fn(&mut DeadObjectEliminationPass, &mut f));
        assert_eq!(opcodes(&f), ["alloc_stack", "store", "load", "ret"]);
    }
}
