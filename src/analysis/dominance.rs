//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{Analysis, AnalysisCache};
use crate::ir::{Definition, Module, Value};
use crate::utility::SaHashMap;

/// Where a value is defined.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DefSite {
    /// The value is a function parameter, and is available everywhere.
    Param,
    /// The value is defined by the instruction at this index in the body.
    Inst(usize),
}

/// Models dominance between definitions and uses.
///
/// Bodies are straight-line, so an instruction dominates exactly the
/// instructions that come after it. This only has to record where every
/// value is defined.
#[derive(Debug, Default)]
pub struct DominanceInfo {
    // indexed by `Value::index`, `None` for values that nothing defines
    functions: SaHashMap<String, Vec<Option<DefSite>>>,
}

fn def_sites(def: &Definition) -> Vec<Option<DefSite>> {
    let mut sites = vec![None; def.value_count()];

    for param in def.params() {
        sites[param.index()] = Some(DefSite::Param);
    }

    for (i, inst) in def.insts().iter().enumerate() {
        let site = inst.result().and_then(|value| sites.get_mut(value.index()));

        if let Some(site) = site {
            site.get_or_insert(DefSite::Inst(i));
        }
    }

    sites
}

impl DominanceInfo {
    /// Computes dominance information for every function with a body.
    pub fn compute(module: &Module) -> Self {
        let functions = module
            .functions()
            .filter_map(|f| Some((f.name().to_owned(), def_sites(f.definition()?))))
            .collect();

        Self { functions }
    }

    /// Gets where `value` is defined in `func`, if it is defined at all.
    pub fn definition(&self, func: &str, value: Value) -> Option<DefSite> {
        self.functions
            .get(func)
            .and_then(|sites| sites.get(value.index()).copied().flatten())
    }

    /// Checks if the definition of `value` dominates the instruction
    /// at index `user` in `func`.
    pub fn dominates(&self, func: &str, value: Value, user: usize) -> bool {
        match self.definition(func, value) {
            Some(DefSite::Param) => true,
            Some(DefSite::Inst(i)) => i < user,
            None => false,
        }
    }
}

/// Computes the [`DominanceInfo`] for a module.
pub struct DominanceAnalysis;

impl Analysis for DominanceAnalysis {
    type Result = DominanceInfo;

    fn compute(&mut self, module: &Module, _: &AnalysisCache) -> Self::Result {
        DominanceInfo::compute(module)
    }
}
