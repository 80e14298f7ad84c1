//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{AnalysisCache, DominanceAnalysis, DominanceInfo};
use crate::ir::*;
use crate::pass::{Invalidation, ModuleTransformPass, PassResult};
use crate::transforms::common::Replacements;
use crate::utility::SaHashMap;
use std::mem;

// a pure instruction with its result erased, two instructions with the same
// key always compute the same value
fn key(inst: &Inst) -> Option<Inst> {
    let erased = Value::new(0);
    let mut key = match inst {
        Inst::Const { .. }
        | Inst::Binary { .. }
        | Inst::Struct { .. }
        | Inst::Extract { .. }
        | Inst::Enum { .. }
        | Inst::EnumPayload { .. } => inst.clone(),
        _ => return None,
    };

    if let Some(dest) = key.result_mut() {
        *dest = erased;
    }

    // `add` and `mul` are commutative
    if let Inst::Binary {
        op: BinaryOp::Add | BinaryOp::Mul,
        lhs,
        rhs,
        ..
    } = &mut key
    {
        if *lhs > *rhs {
            mem::swap(lhs, rhs);
        }
    }

    Some(key)
}

/// Common subexpression elimination.
///
/// Any pure instruction that recomputes a value that is already available
/// (i.e. the earlier definition dominates it) is removed, and its uses are
/// rewritten to use the earlier definition.
pub struct CsePass;

impl CsePass {
    fn eliminate(name: &str, def: &mut Definition, dom: &DominanceInfo) -> bool {
        let mut available = SaHashMap::<Inst, Value>::default();
        let mut replacements = Replacements::new();

        for (i, mut inst) in mem::take(def.insts_mut()).into_iter().enumerate() {
            replacements.apply(&mut inst);

            if let (Some(key), Some(dest)) = (key(&inst), inst.result()) {
                match available.get(&key) {
                    Some(&earlier) if dom.dominates(name, earlier, i) => {
                        replacements.replace(dest, earlier);

                        continue;
                    }
                    _ => {
                        available.insert(key, dest);
                    }
                }
            }

            def.push(inst);
        }

        !replacements.is_empty()
    }
}

impl ModuleTransformPass for CsePass {
    fn name(&self) -> &'static str {
        "cse"
    }

    fn invalidates(&self) -> Invalidation {
        Invalidation::only::<DominanceAnalysis>()
    }

    fn run(&mut self, module: &mut Module, am: &AnalysisCache) -> PassResult {
        let dom = am.get::<DominanceAnalysis>(module);
        let mut changed = false;

        // the dominance info describes the module as it was before this pass
        // touched it, but every function is only rewritten once
        for func in module.functions_mut() {
            let name = func.name().to_owned();

            if let Some(def) = func.definition_mut() {
                changed |= Self::eliminate(&name, def, &dom);
            }
        }

        PassResult::new(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eliminates_redundant_arithmetic() {
        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("f", 2);
        let (x, y) = (b.param(0), b.param(1));
        let a = b.add(x, y);
        let c = b.add(y, x);
        let d = b.sub(x, y);
        let e = b.sub(y, x);
        let two = b.iconst(2);
        let also_two = b.iconst(2);
        b.call_void("use", &[a, c, d, e, two, also_two]);
        b.ret(None);
        module.insert_function(b.build());

        let mut am = AnalysisCache::new();
        am.register(DominanceAnalysis).unwrap();

        assert!(CsePass.run(&mut module, &am).changed());

        let def = module.function("f").unwrap().definition().unwrap();
        assert_eq!(def.len(), 6);
        assert_eq!(def.use_count(a), 2);
        assert_eq!(def.use_count(two), 2);
        assert_eq!(def.use_count(e), 1);
    }
}
