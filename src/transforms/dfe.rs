//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{AnalysisCache, CallGraphAnalysis};
use crate::ir::{Linkage, Module};
use crate::pass::{ModuleTransformPass, PassResult};

/// Removes functions that can never be called.
///
/// Public functions and everything referenced by a class's method table are
/// always considered live, anything not reachable from them through the
/// call graph is removed.
pub struct DeadFunctionEliminationPass;

impl ModuleTransformPass for DeadFunctionEliminationPass {
    fn name(&self) -> &'static str {
        "dead-function-elimination"
    }

    fn run(&mut self, module: &mut Module, am: &AnalysisCache) -> PassResult {
        let live = {
            let graph = am.get::<CallGraphAnalysis>(module);
            let roots = module
                .functions()
                .filter(|f| f.linkage() == Linkage::Public)
                .map(|f| f.name())
                .chain(module.classes().flat_map(|class| class.implementations()));

            graph.reachable_from(roots)
        };

        let removed = module.retain_functions(|f| live.contains(f.name()));

        if removed != 0 {
            log::debug!("removed {removed} dead function(s) from `{}`", module.name());
        }

        PassResult::new(removed != 0)
    }
}
