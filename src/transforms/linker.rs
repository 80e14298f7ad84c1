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
use crate::utility::SaHashSet;

/// Links in the definitions of called functions from the module's
/// [`DefinitionLoader`].
///
/// Both declarations and callees missing from the module entirely are
/// linked. Linking is transitive, anything called by a linked definition
/// is linked too. Once the loader has been invalidated this does nothing.
pub struct LinkerPass;

impl LinkerPass {
    fn unresolved(module: &Module) -> SaHashSet<String> {
        let resolved = |name: &str| module.function(name).map_or(false, |f| !f.is_declaration());
        let mut wanted = SaHashSet::default();

        for def in module.functions().filter_map(Function::definition) {
            for inst in def.insts() {
                if let Inst::Call { callee, .. } = inst {
                    match callee.static_target() {
                        Some(target) if !resolved(target) => {
                            wanted.insert(target.to_owned());
                        }
                        _ => {}
                    }
                }
            }
        }

        wanted
    }
}

impl ModuleTransformPass for LinkerPass {
    fn name(&self) -> &'static str {
        "linker"
    }

    fn run(&mut self, module: &mut Module, _: &AnalysisCache) -> PassResult {
        let mut changed = false;
        let mut attempted = SaHashSet::<String>::default();

        loop {
            let loader = match module.loader() {
                Some(loader) => loader,
                None => break,
            };

            let linked: Vec<Function> = Self::unresolved(module)
                .into_iter()
                .filter(|name| attempted.insert(name.clone()))
                .filter_map(|name| loader.lookup(&name).cloned())
                .collect();

            if linked.is_empty() {
                break;
            }

            for function in linked {
                log::debug!("linking `@{}` into `{}`", function.name(), module.name());

                module.insert_function(function);
                changed = true;
            }
        }

        PassResult::new(changed)
    }
}
