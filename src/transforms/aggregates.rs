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
use crate::utility::{SaHashMap, SaHashSet};
use smallvec::SmallVec;
use std::mem;

/// Splits reference counting operations on aggregates into operations on
/// their fields.
///
/// ```none
/// %2 = struct (%0, %1)
/// retain %2             ; becomes `retain %0` and `retain %1`
/// ```
pub struct LowerAggregatePass;

impl FunctionTransformPass for LowerAggregatePass {
    fn name(&self) -> &'static str {
        "lower-aggregate"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let mut structs = SaHashMap::<Value, SmallVec<[Value; 4]>>::default();
        let mut changed = false;

        for inst in mem::take(def.insts_mut()) {
            match &inst {
                Inst::Struct { dest, fields } => {
                    structs.insert(*dest, fields.clone());
                }
                Inst::Retain { value } | Inst::Release { value } => {
                    if let Some(fields) = structs.get(value) {
                        let retain = matches!(inst, Inst::Retain { .. });

                        for &field in fields.iter() {
                            def.push(if retain {
                                Inst::Retain { value: field }
                            } else {
                                Inst::Release { value: field }
                            });
                        }

                        changed = true;

                        continue;
                    }
                }
                _ => {}
            }

            def.push(inst);
        }

        changed
    }
}

/// Scalar replacement of aggregates.
///
/// A stack slot that is only ever initialized with a single `struct` and
/// whose loads are only used to extract fields is replaced by the fields
/// themselves.
///
/// ```none
/// %2 = struct (%0, %1)
/// $0 = alloc_stack         ; removed
/// store %2 to $0           ; removed
/// %3 = load $0             ; removed
/// %4 = extract %3, 1       ; uses of %4 become uses of %1
/// ```
pub struct SroaPass;

impl SroaPass {
    // gets the fields stored into `slot` if it can be scalarized
    fn scalarizable(def: &Definition, slot: Slot) -> Option<SmallVec<[Value; 4]>> {
        let mut stored = None;
        let mut loads = SaHashSet::<Value>::default();

        for inst in def.insts() {
            match inst {
                Inst::Store { slot: s, value } if *s == slot => {
                    if stored.replace(*value).is_some() {
                        return None;
                    }
                }
                Inst::Load { slot: s, dest } if *s == slot => {
                    stored?;
                    loads.insert(*dest);
                }
                Inst::Capture { slot: s, .. } if *s == slot => return None,
                _ => {}
            }
        }

        let fields = match def.defining_inst(stored?)? {
            Inst::Struct { fields, .. } => fields.clone(),
            _ => return None,
        };

        // every use of a load has to be an in-bounds extract
        for inst in def.insts() {
            let in_bounds = match inst {
                Inst::Extract {
                    aggregate, index, ..
                } if loads.contains(aggregate) => (*index as usize) < fields.len(),
                _ => !inst.operands().iter().any(|op| loads.contains(op)),
            };

            if !in_bounds {
                return None;
            }
        }

        Some(fields)
    }
}

impl FunctionTransformPass for SroaPass {
    fn name(&self) -> &'static str {
        "sroa"
    }

    fn invalidates(&self) -> Invalidation {
        common::body_local()
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        let def = match func.definition_mut() {
            Some(def) => def,
            None => return false,
        };

        let view: &Definition = def;
        let scalarized: SaHashMap<Slot, SmallVec<[Value; 4]>> = view
            .insts()
            .iter()
            .filter_map(|inst| match inst {
                Inst::AllocStack { slot } => Some(*slot),
                _ => None,
            })
            .filter_map(|slot| Some((slot, Self::scalarizable(view, slot)?)))
            .collect();

        if scalarized.is_empty() {
            return false;
        }

        let mut loaded = SaHashMap::<Value, Slot>::default();
        let mut replacements = Replacements::new();

        for mut inst in mem::take(def.insts_mut()) {
            replacements.apply(&mut inst);

            match &inst {
                Inst::AllocStack { slot } | Inst::Store { slot, .. }
                    if scalarized.contains_key(slot) =>
                {
                    continue
                }
                Inst::Load { dest, slot } if scalarized.contains_key(slot) => {
                    loaded.insert(*dest, *slot);

                    continue;
                }
                Inst::Extract {
                    dest,
                    aggregate,
                    index,
                } => {
                    if let Some(slot) = loaded.get(aggregate) {
                        replacements.replace(*dest, scalarized[slot][*index as usize]);

                        continue;
                    }
                }
                _ => {}
            }

            def.push(inst);
        }

        true
    }
}
