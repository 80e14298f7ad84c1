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
use crate::pass::{ModuleTransformPass, PassResult};

/// Specializes calls to generic functions.
///
/// A call like `call @id<Int>(%0)` gets a private, non-generic copy of `@id`
/// named `@id<Int>` and is rewritten to call that copy directly. Copies are
/// shared between every call site with the same substitution.
pub struct GenericSpecializerPass;

/// Gets the name of the specialization of `function` for `substitution`.
pub fn specialized_name(function: &str, substitution: &str) -> String {
    format!("{function}<{substitution}>")
}

impl ModuleTransformPass for GenericSpecializerPass {
    fn name(&self) -> &'static str {
        "generic-specializer"
    }

    fn run(&mut self, module: &mut Module, _: &AnalysisCache) -> PassResult {
        let mut sites = Vec::new();

        for func in module.functions() {
            for (i, inst) in func.definition().into_iter().flat_map(Definition::insts).enumerate() {
                if let Inst::Call {
                    callee: Callee::Direct(target),
                    substitution: Some(substitution),
                    ..
                } = inst
                {
                    let generic = module
                        .function(target)
                        .map_or(false, |f| f.attrs().generic && !f.is_declaration());

                    if generic {
                        sites.push((func.name().to_owned(), i, target.clone(), substitution.clone()));
                    }
                }
            }
        }

        let changed = !sites.is_empty();

        for (caller, i, target, substitution) in sites {
            let name = specialized_name(&target, &substitution);

            if module.function(&name).is_none() {
                let specialized = module.function(&target).map(|generic| {
                    let mut copy = generic.clone_as(&name);

                    copy.set_linkage(Linkage::Private);
                    copy.attrs_mut().generic = false;
                    copy
                });

                if let Some(specialized) = specialized {
                    log::debug!("specializing `@{target}` as `@{name}`");

                    module.insert_function(specialized);
                }
            }

            let inst = module
                .function_mut(&caller)
                .and_then(Function::definition_mut)
                .and_then(|def| def.insts_mut().get_mut(i));

            if let Some(Inst::Call {
                callee,
                substitution,
                ..
            }) = inst
            {
                *callee = Callee::Direct(name);
                *substitution = None;
            }
        }

        PassResult::new(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::verify_module;

    #[test]
    fn shares_specializations() {
        let mut module = Module::new("test");
        let mut id = FunctionBuilder::new("id", 1).generic();
        let p = id.param(0);
        id.ret(Some(p));
        module.insert_function(id.build());

        let mut b = FunctionBuilder::new("main", 1);
        let p = b.param(0);
        let a = b.call_generic("id", "Int", &[p]);
        let c = b.call_generic("id", "Int", &[a]);
        let d = b.call_generic("id", "Bool", &[c]);
        b.ret(Some(d));
        module.insert_function(b.build());

        let am = AnalysisCache::new();

        assert!(GenericSpecializerPass.run(&mut module, &am).changed());
        assert_eq!(module.function_names(), ["id", "main", "id<Int>", "id<Bool>"]);

        let specialized = module.function("id<Int>").unwrap();
        assert!(!specialized.attrs().generic);
        assert_eq!(specialized.linkage(), Linkage::Private);

        assert!(!GenericSpecializerPass.run(&mut module, &am).changed());
        assert_eq!(verify_module(&module), Ok(()));
    }
}
