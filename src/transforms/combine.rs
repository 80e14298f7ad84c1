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
use crate::transforms::common::{self, Replacements};
use crate::utility::SaHashMap;
use smallvec::SmallVec;
use std::mem;

type Fields = SmallVec<[Value; 4]>;

enum Simplified {
    // every use of the instruction's result becomes a use of this
    Forward(Value),
    // the instruction is replaced by a constant
    Constant(i64),
}

/// Applies local algebraic simplifications.
///
/// - `x + 0`, `0 + x`, `x - 0`, `x * 1` and `1 * x` become `x`
/// - `x * 0` and `0 * x` become `0`
/// - `extract (struct a, b, c), 1` becomes `b`
pub struct CombinePass;

impl CombinePass {
    fn simplify(
        inst: &Inst,
        constants: &SaHashMap<Value, i64>,
        structs: &SaHashMap<Value, Fields>,
    ) -> Option<Simplified> {
        let constant = |v: &Value| constants.get(v).copied();

        match inst {
            Inst::Binary { op, lhs, rhs, .. } => match (op, constant(lhs), constant(rhs)) {
                (BinaryOp::Add, _, Some(0)) | (BinaryOp::Sub, _, Some(0)) => {
                    Some(Simplified::Forward(*lhs))
                }
                (BinaryOp::Add, Some(0), _) => Some(Simplified::Forward(*rhs)),
                (BinaryOp::Mul, _, Some(0)) | (BinaryOp::Mul, Some(0), _) => {
                    Some(Simplified::Constant(0))
                }
                (BinaryOp::Mul, _, Some(1)) => Some(Simplified::Forward(*lhs)),
                (BinaryOp::Mul, Some(1), _) => Some(Simplified::Forward(*rhs)),
                _ => None,
            },
            Inst::Extract {
                aggregate, index, ..
            } => structs
                .get(aggregate)
                .and_then(|fields| fields.get(*index as usize))
                .map(|field| Simplified::Forward(*field)),
            _ => None,
        }
    }
}

impl FunctionTransformPass for CombinePass {
    fn name(&self) -> &'static str {
        "combine"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let mut constants = SaHashMap::<Value, i64>::default();
        let mut structs = SaHashMap::<Value, Fields>::default();
        let mut replacements = Replacements::new();
        let mut changed = false;

        for mut inst in mem::take(def.insts_mut()) {
            replacements.apply(&mut inst);

            match Self::simplify(&inst, &constants, &structs) {
                Some(Simplified::Forward(value)) => {
                    if let Some(dest) = inst.result() {
                        replacements.replace(dest, value);
                        changed = true;

                        continue;
                    }
                }
                Some(Simplified::Constant(value)) => {
                    if let Some(dest) = inst.result() {
                        inst = Inst::Const { dest, value };
                        changed = true;
                    }
                }
                None => {}
            }

            match &inst {
                Inst::Const { dest, value } => {
                    constants.insert(*dest, *value);
                }
                Inst::Struct { dest, fields } => {
                    structs.insert(*dest, fields.clone());
                }
                _ => {}
            }

            def.push(inst);
        }

        changed
    }
}

/// Projects payloads directly out of enum values that are built in the
/// same function.
///
/// ```none
/// %1 = enum #2(%0)
/// %2 = enum_payload %1, #2      ; uses of %2 become uses of %0
/// ```
pub struct EnumSimplificationPass;

impl FunctionTransformPass for EnumSimplificationPass {
    fn name(&self) -> &'static str {
        "enum-simplification"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let mut payloads = SaHashMap::<Value, (u32, Value)>::default();
        let mut replacements = Replacements::new();

        for mut inst in mem::take(def.insts_mut()) {
            replacements.apply(&mut inst);

            match &inst {
                Inst::Enum {
                    dest,
                    case,
                    payload: Some(payload),
                } => {
                    payloads.insert(*dest, (*case, *payload));
                }
                Inst::EnumPayload { dest, value, case } => match payloads.get(value) {
                    Some(&(known, payload)) if known == *case => {
                        replacements.replace(*dest, payload);

                        continue;
                    }
                    _ => {}
                },
                _ => {}
            }

            def.push(inst);
        }

        !replacements.is_empty()
    }
}

/// Removes redundant `global_addr` instructions. The first access to a
/// global in a function already runs its initializer, later ones can reuse it.
pub struct GlobalOptPass;

impl FunctionTransformPass for GlobalOptPass {
    fn name(&self) -> &'static str {
        "global-opt"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let mut first = SaHashMap::<String, Value>::default();
        let mut replacements = Replacements::new();

        for mut inst in mem::take(def.insts_mut()) {
            replacements.apply(&mut inst);

            if let Inst::GlobalAddr { dest, global } = &inst {
                match first.get(global) {
                    Some(&existing) => {
                        replacements.replace(*dest, existing);

                        continue;
                    }
                    None => {
                        first.insert(global.clone(), *dest);
                    }
                }
            }

            def.push(inst);
        }

        !replacements.is_empty()
    }
}
