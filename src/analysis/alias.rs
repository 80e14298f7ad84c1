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
use crate::ir::{Definition, Inst, Module, Slot};
use crate::utility::SaHashMap;
use smallbitvec::SmallBitVec;

#[derive(Debug, Default)]
struct SlotFacts {
    escaping: SmallBitVec,
    heap: SmallBitVec,
}

impl SlotFacts {
    fn compute(def: &Definition) -> Self {
        let count = def.slot_count();
        let mut facts = Self {
            escaping: SmallBitVec::from_elem(count, false),
            heap: SmallBitVec::from_elem(count, false),
        };

        for inst in def.insts() {
            match inst {
                Inst::AllocBox { slot } => facts.heap.set(slot.index(), true),
                Inst::Capture { slot, .. } => facts.escaping.set(slot.index(), true),
                _ => {}
            }
        }

        facts
    }
}

/// Models which memory slots may be accessed from outside of the
/// function that allocated them.
///
/// Slots are only ever reachable through `load`, `store` and `capture`. The
/// first two are local, but a by-reference capture hands the slot to a
/// closure that could do anything with it.
#[derive(Debug, Default)]
pub struct AliasInfo {
    functions: SaHashMap<String, SlotFacts>,
}

impl AliasInfo {
    /// Computes alias information for every function with a body.
    pub fn compute(module: &Module) -> Self {
        let functions = module
            .functions()
            .filter_map(|f| Some((f.name().to_owned(), SlotFacts::compute(f.definition()?))))
            .collect();

        Self { functions }
    }

    /// Checks if `slot` in `func` may escape. Anything that
    /// isn't known about is assumed to escape.
    pub fn may_escape(&self, func: &str, slot: Slot) -> bool {
        self.functions
            .get(func)
            .and_then(|facts| facts.escaping.get(slot.index()))
            .unwrap_or(true)
    }

    /// Checks if `slot` in `func` is allocated by an `alloc_box`.
    pub fn is_heap(&self, func: &str, slot: Slot) -> bool {
        self.functions
            .get(func)
            .and_then(|facts| facts.heap.get(slot.index()))
            .unwrap_or(false)
    }
}

/// Computes the [`AliasInfo`] for a module.
pub struct AliasAnalysis;

impl Analysis for AliasAnalysis {
    type Result = AliasInfo;

    fn compute(&mut self, module: &Module, _: &AnalysisCache) -> Self::Result {
        AliasInfo::compute(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn captures_escape() {
        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("f", 0);
        let captured = b.alloc_box();
        let local = b.alloc_box();
        let stack = b.alloc_stack();
        let zero = b.iconst(0);
        b.store(local, zero);
        b.capture(captured);
        b.ret(None);
        module.insert_function(b.build());

        let info = AliasInfo::compute(&module);

        assert!(info.may_escape("f", captured));
        assert!(!info.may_escape("f", local));
        assert!(!info.may_escape("f", stack));
        assert!(info.is_heap("f", local));
        assert!(!info.is_heap("f", stack));
        assert!(info.may_escape("g", local));
    }
}
