//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Definition, Inst, Slot, Value};
use crate::transforms::common::Replacements;
use crate::utility::{SaHashMap, SaHashSet};
use std::mem;

/// Replaces loads whose result is statically known with the value that
/// was last stored into the slot.
///
/// ```none
/// store %0 to $0
/// %1 = load $0       ; removed, uses of %1 become uses of %0
/// ```
///
/// Once a slot is captured by reference, nothing is known about its contents
/// anymore and it is never forwarded again.
pub fn forward_stores(def: &mut Definition) -> bool {
    let mut known = SaHashMap::<Slot, Value>::default();
    let mut escaped = SaHashSet::<Slot>::default();
    let mut replacements = Replacements::new();
    let old = mem::take(def.insts_mut());
    let before = old.len();

    for mut inst in old {
        replacements.apply(&mut inst);

        match &inst {
            Inst::Store { slot, value } if !escaped.contains(slot) => {
                known.insert(*slot, *value);
            }
            Inst::Capture { slot, .. } => {
                escaped.insert(*slot);
                known.remove(slot);
            }
            Inst::Load { dest, slot } => {
                if let Some(&value) = known.get(slot) {
                    replacements.replace(*dest, value);

                    continue;
                }
            }
            _ => {}
        }

        def.push(inst);
    }

    def.len() != before
}

/// Gets every slot in the body that is captured by reference.
pub fn captured_slots(def: &Definition) -> SaHashSet<Slot> {
    def.insts()
        .iter()
        .filter_map(|inst| match inst {
            Inst::Capture { slot, .. } => Some(*slot),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn forwards_until_captured() {
        let mut b = FunctionBuilder::new("f", 1);
        let p = b.param(0);
        let slot = b.alloc_stack();
        b.store(slot, p);
        let first = b.load(slot);
        b.capture(slot);
        let second = b.load(slot);
        let sum = b.add(first, second);
        b.ret(Some(sum));

        let mut f = b.build();
        let def = f.definition_mut().unwrap();

        assert!(forward_stores(def));
        assert!(!forward_stores(def));
        assert_eq!(def.use_count(p), 2);
        assert!(def.insts().contains(&Inst::Load { dest: second, slot }));
        assert_eq!(captured_slots(def).len(), 1);
    }
}
