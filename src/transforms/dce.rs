//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::diagnostics::Diagnostics;
use crate::ir::{Function, Inst};
use crate::pass::{FunctionTransformPass, Invalidation};
use crate::transforms::common;
use smallbitvec::SmallBitVec;

/// Aggressive dead code elimination.
///
/// This walks the body backwards, so every use is seen before its definition.
/// Everything that can't cause side effects is assumed to be dead until a live
/// instruction uses it, and everything that stays dead is removed.
///
/// Allocations are left alone, removing unused slots is the job of
/// [`DeadObjectEliminationPass`](crate::transforms::DeadObjectEliminationPass).
pub struct DeadCodeEliminationPass;

impl FunctionTransformPass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let mut live = SmallBitVec::from_elem(def.value_count(), false);
        let mut keep = SmallBitVec::from_elem(def.len(), false);

        for (i, inst) in def.insts().iter().enumerate().rev() {
            let is_result_live = inst
                .result()
                .map_or(false, |value| live.get(value.index()).unwrap_or(true));

            if is_result_live || inst.has_side_effect() || inst.allocated_slot().is_some() {
                for operand in inst.operands() {
                    if operand.index() < live.len() {
                        live.set(operand.index(), true);
                    }
                }

                keep.set(i, true);
            }
        }

        if keep.all_true() {
            return false;
        }

        let mut index = 0;

        def.insts_mut().retain(|_: &Inst| {
            let kept = keep[index];

            index += 1;

            kept
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn removes_unused_chains() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let one = b.iconst(1);
        let dead = b.add(p, one);
        b.mul(dead, dead);
        let slot = b.alloc_stack();
        b.load(slot);
        let kept = b.iconst(4);
        b.call_void("print", &[kept]);
        b.ret(None);

        let mut f = b.build();

        assert!(DeadCodeEliminationPass.run(&mut f, &mut Diagnostics::new()));
        assert_eq!(
            f.definition()
                .unwrap()
                .insts()
                .iter()
                .map(Inst::opcode)
                .collect::<Vec<_>>(),
            ["alloc_stack", "iconst", "call", "ret"]
        );
        assert!(!DeadCodeEliminationPass.run(&mut f, &mut Diagnostics::new()));
    }
}
