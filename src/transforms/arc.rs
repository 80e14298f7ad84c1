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
use crate::ir::*;
use crate::pass::{FunctionTransformPass, Invalidation};
use crate::transforms::common;

// anything that could observe or change a reference count has to stay
// ordered with respect to the retain
fn blocks_retain(inst: &Inst, value: Value) -> bool {
    inst.is_terminator()
        || matches!(inst, Inst::Call { .. } | Inst::Release { .. } | Inst::Retain { .. })
        || inst.operands().contains(&value)
}

/// Sinks `retain` instructions as far down as they can go, right up until
/// the first instruction that uses the value (or could release it).
///
/// This exposes `retain`/`release` pairs to [`GlobalArcOptsPass`].
pub struct CodeMotionPass;

impl FunctionTransformPass for CodeMotionPass {
    fn name(&self) -> &'static str {
        "code-motion"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let insts = match func.definition_mut() {
            Some(def) => def.insts_mut(),
            None => return false,
        };

        let mut changed = false;
        let mut i = 0;

        while i < insts.len() {
            let value = match insts[i] {
                Inst::Retain { value } => value,
                _ => {
                    i += 1;
                    continue;
                }
            };

            let stop = insts[i + 1..]
                .iter()
                .position(|inst| blocks_retain(inst, value))
                .map_or(insts.len(), |offset| i + 1 + offset);

            if stop > i + 1 {
                let retain = insts.remove(i);

                insts.insert(stop - 1, retain);
                changed = true;
            } else {
                i += 1;
            }
        }

        changed
    }
}

/// Removes a `retain` that is immediately followed by a `release` of the
/// same value, the pair has no effect.
pub struct GlobalArcOptsPass;

impl FunctionTransformPass for GlobalArcOptsPass {
    fn name(&self) -> &'static str {
        "global-arc-opts"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let insts = match func.definition_mut() {
            Some(def) => def.insts_mut(),
            None => return false,
        };

        let before = insts.len();
        let mut i = 0;

        while i + 1 < insts.len() {
            match (&insts[i], &insts[i + 1]) {
                (Inst::Retain { value: a }, Inst::Release { value: b }) if a == b => {
                    insts.drain(i..i + 2);

                    // the removal may have made a new pair adjacent
                    i = i.saturating_sub(1);
                }
                _ => i += 1,
            }
        }

        insts.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opcodes(f: &Function) -> Vec<&'static str> {
        f.definition()
            .unwrap()
            .insts()
            .iter()
            .map(Inst::opcode)
            .collect()
    }

    #[test]
    fn sinks_then_pairs() {
        let mut b = FunctionBuilder::new("f", 2);
        let (x, y) = (b.param(0), b.param(1));
        b.retain(x);
        let one = b.iconst(1);
        b.add(y, one);
        b.release(x);
        b.ret(None);

        let mut f = b.build();

        assert!(CodeMotionPass.run(&mut f, &mut Diagnostics::new()));
        assert_eq!(opcodes(&f), ["iconst", "add", "retain", "release", "ret"]);
        assert!(!CodeMotionPass.run(&mut f, &mut Diagnostics::new()));

        assert!(GlobalArcOptsPass.run(&mut f, &mut Diagnostics::new()));
        assert_eq!(opcodes(&f), ["iconst", "add", "ret"]);
    }

    #[test]
    fn nested_pairs() {
        let mut b = FunctionBuilder::new("f", 1);
        let x = b.param(0);
        b.retain(x);
        b.retain(x);
        b.release(x);
        b.release(x);
        b.ret(None);

        let mut f = b.build();

        assert!(GlobalArcOptsPass.run(&mut f, &mut Diagnostics::new()));
        assert_eq!(opcodes(&f), ["ret"]);
    }

    #[test]
    fn stops_at_use() {
        let mut b = FunctionBuilder::new("f", 1);
        let x = b.param(0);
        b.retain(x);
        b.call_void("consume", &[x]);
        b.ret(None);

        let mut f = b.build();

        assert!(!CodeMotionPass.run(&mut f, &mut Diagnostics::new()));
    }
}
