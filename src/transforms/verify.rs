//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::AnalysisCache;
use crate::ir::*;
use crate::pass::{Invalidation, ModuleTransformPass, PassResult};
use smallbitvec::SmallBitVec;

/// An IR validity verification pass.
///
/// This scans the entire module, and will do nothing if the module is valid. If
/// the module isn't valid, it will panic with every error that was found.
pub struct VerifyModulePass;

impl ModuleTransformPass for VerifyModulePass {
    fn name(&self) -> &'static str {
        "verify"
    }

    fn invalidates(&self) -> Invalidation {
        Invalidation::Nothing
    }

    fn run(&mut self, module: &mut Module, _: &AnalysisCache) -> PassResult {
        if let Err(errors) = verify_module(module) {
            panic!(
                "module `{}` is invalid:\n{}\n\n{module}",
                module.name(),
                errors.join("\n")
            );
        }

        PassResult::unchanged()
    }
}

/// Verifies that an entire module is structurally valid.
///
/// This checks that every value is defined exactly once and before it is used,
/// that every slot is allocated before it is accessed, and that every call refers
/// to a function or class that actually exists.
///
/// If it isn't, this function returns a list of errors describing what's wrong.
pub fn verify_module(module: &Module) -> Result<(), Vec<String>> {
    let mut verifier = Verifier {
        module,
        errors: Vec::default(),
    };

    for func in module.functions() {
        if let Some(def) = func.definition() {
            verifier.verify_body(func.name(), def);
        }
    }

    if verifier.errors.is_empty() {
        Ok(())
    } else {
        Err(verifier.errors)
    }
}

struct Verifier<'m> {
    module: &'m Module,
    errors: Vec<String>,
}

impl<'m> Verifier<'m> {
    fn verify_body(&mut self, name: &str, def: &Definition) {
        let mut defined = SmallBitVec::from_elem(def.value_count(), false);
        let mut allocated = SmallBitVec::from_elem(def.slot_count(), false);

        for param in def.params() {
            defined.set(param.index(), true);
        }

        for (i, inst) in def.insts().iter().enumerate() {
            for operand in inst.operands() {
                if !defined.get(operand.index()).unwrap_or(false) {
                    self.errors.push(format!(
                        "`@{name}`: `{operand}` is used by instruction {i} (`{inst}`) before it is defined"
                    ));
                }
            }

            if let Some(slot) = inst.allocated_slot() {
                match allocated.get(slot.index()) {
                    Some(false) => allocated.set(slot.index(), true),
                    Some(true) => self.errors.push(format!(
                        "`@{name}`: `{slot}` is allocated more than once"
                    )),
                    None => self
                        .errors
                        .push(format!("`@{name}`: `{slot}` was never created by the body")),
                }
            } else if let Some(slot) = inst.slot() {
                if !allocated.get(slot.index()).unwrap_or(false) {
                    self.errors.push(format!(
                        "`@{name}`: `{slot}` is accessed by instruction {i} (`{inst}`) before it is allocated"
                    ));
                }
            }

            if let Some(result) = inst.result() {
                match defined.get(result.index()) {
                    Some(false) => defined.set(result.index(), true),
                    Some(true) => self.errors.push(format!(
                        "`@{name}`: `{result}` is defined more than once"
                    )),
                    None => self
                        .errors
                        .push(format!("`@{name}`: `{result}` was never created by the body")),
                }
            }

            if let Inst::Call { callee, .. } = inst {
                self.verify_callee(name, callee);
            }
        }
    }

    fn verify_callee(&mut self, name: &str, callee: &Callee) {
        match callee {
            Callee::Virtual { class, .. } | Callee::Speculative { class, .. }
                if self.module.class(class).is_none() =>
            {
                self.errors
                    .push(format!("`@{name}`: call through unknown class `{class}`"));
            }
            _ => {}
        }

        if let Some(target) = callee.static_target() {
            if self.module.function(target).is_none() {
                self.errors
                    .push(format!("`@{name}`: call to unknown function `@{target}`"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_module() {
        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("main", 1);
        let p = b.param(0);
        let slot = b.alloc_stack();
        b.store(slot, p);
        let x = b.load(slot);
        let y = b.call("id", &[x]);
        b.ret(Some(y));

        module.insert_function(b.build());
        module.insert_function(Function::declaration("id", FunctionAttrs::default()));

        assert_eq!(verify_module(&module), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut module = Module::new("test");
        let mut def = Definition::new(0);
        let early = def.make_value();
        let slot = def.make_slot();
        let dest = def.make_value();

        def.push(Inst::Retain { value: early });
        def.push(Inst::Load { dest, slot });
        def.push(Inst::Call {
            dest: None,
            callee: Callee::Virtual {
                class: "Missing".into(),
                method: "m".into(),
            },
            substitution: None,
            args: Default::default(),
        });
        def.push(Inst::Return { value: None });

        module.insert_function(Function::new(
            "broken",
            Linkage::Public,
            FunctionAttrs::default(),
            def,
        ));

        let errors = verify_module(&module).unwrap_err();

        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("`%0` is used by instruction 0"));
        assert!(errors[1].contains("`$0` is accessed"));
        assert!(errors[2].contains("unknown class `Missing`"));
    }
}
