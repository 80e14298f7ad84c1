//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::DominanceAnalysis;
use crate::diagnostics::Diagnostics;
use crate::ir::*;
use crate::pass::{FunctionTransformPass, Invalidation};
use crate::utility::SaHashMap;

/// Folds arithmetic over constants into constants.
///
/// ```none
/// %0 = iconst 2
/// %1 = iconst 3
/// %2 = mul %0, %1       ; becomes `%2 = iconst 6`
/// ```
///
/// The diagnostic flavor reports an error for operations that are known to
/// overflow, the performance flavor just leaves them alone (they will trap
/// at runtime).
pub struct ConstantPropagationPass {
    diagnose_overflow: bool,
}

impl ConstantPropagationPass {
    /// Creates the flavor that runs as part of the diagnostic pipeline.
    pub fn diagnostic() -> Self {
        Self {
            diagnose_overflow: true,
        }
    }

    /// Creates the flavor that runs as part of the optimization pipeline.
    pub fn performance() -> Self {
        Self {
            diagnose_overflow: false,
        }
    }
}

impl FunctionTransformPass for ConstantPropagationPass {
    fn name(&self) -> &'static str {
        if self.diagnose_overflow {
            "diagnostic-constant-propagation"
        } else {
            "performance-constant-propagation"
        }
    }

    // only ever swaps an instruction for another one defining the same value
    fn invalidates(&self) -> Invalidation {
        Invalidation::only::<DominanceAnalysis>()
    }

    fn run(&mut self, func: &mut Function, diagnostics: &mut Diagnostics) -> bool {
        let name = func.name().to_owned();
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let mut constants = SaHashMap::<Value, i64>::default();
        let mut changed = false;

        for inst in def.insts_mut().iter_mut() {
            match *inst {
                Inst::Const { dest, value } => {
                    constants.insert(dest, value);
                }
                Inst::Binary { dest, op, lhs, rhs } => {
                    let (lhs, rhs) = match (constants.get(&lhs), constants.get(&rhs)) {
                        (Some(&lhs), Some(&rhs)) => (lhs, rhs),
                        _ => continue,
                    };

                    match op.evaluate(lhs, rhs) {
                        Some(value) => {
                            *inst = Inst::Const { dest, value };
                            constants.insert(dest, value);
                            changed = true;
                        }
                        None if self.diagnose_overflow => diagnostics.error(
                            &name,
                            format!("arithmetic operation `{} {lhs}, {rhs}` overflows", op.mnemonic()),
                        ),
                        None => {}
                    }
                }
                _ => {}
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overflowing() -> Function {
        let mut b = FunctionBuilder::new("f", 0);
        let big = b.iconst(i64::MAX);
        let two = b.iconst(2);
        let three = b.iconst(3);
        let six = b.mul(two, three);
        let one = b.iconst(1);
        let seven = b.add(six, one);
        let boom = b.mul(big, two);
        let sum = b.add(seven, boom);
        b.ret(Some(sum));
        b.build()
    }

    #[test]
    fn folds_chains() {
        let mut f = overflowing();
        let mut diagnostics = Diagnostics::new();

        assert!(ConstantPropagationPass::performance().run(&mut f, &mut diagnostics));
        assert!(diagnostics.is_empty());

        let consts: Vec<i64> = f
            .definition()
            .unwrap()
            .insts()
            .iter()
            .filter_map(|inst| match inst {
                Inst::Const { value, .. } => Some(*value),
                _ => None,
            })
            .collect();

        assert_eq!(consts, [i64::MAX, 2, 3, 6, 1, 7]);
    }

    #[test]
    fn diagnoses_overflow() {
        let mut f = overflowing();
        let mut diagnostics = Diagnostics::new();
        let mut pass = ConstantPropagationPass::diagnostic();

        assert!(pass.run(&mut f, &mut diagnostics));
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(pass.name(), "diagnostic-constant-propagation");

        let def = f.definition().unwrap();
        assert_eq!(def.insts().iter().filter(|i| i.opcode() == "mul").count(), 1);
    }
}
