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
use crate::ir::{Callee, Inst, Module};
use crate::utility::{SaHashMap, SaHashSet};

/// Models which functions call which other functions.
///
/// Only statically known targets form edges: direct calls, and the expected
/// target of inline caches. Fully dynamic call sites are counted, but since the
/// callee isn't known they don't contribute any edges.
#[derive(Debug, Default)]
pub struct CallGraph {
    callees: SaHashMap<String, Vec<String>>,
    callers: SaHashMap<String, Vec<String>>,
    virtual_sites: usize,
    speculative_sites: usize,
}

impl CallGraph {
    /// Builds the call graph for a module.
    pub fn compute(module: &Module) -> Self {
        let mut graph = Self::default();

        for func in module.functions() {
            let mut callees = Vec::new();

            for inst in func.definition().into_iter().flat_map(|def| def.insts()) {
                let callee = match inst {
                    Inst::Call { callee, .. } => callee,
                    _ => continue,
                };

                match callee {
                    Callee::Virtual { .. } => graph.virtual_sites += 1,
                    Callee::Speculative { .. } => graph.speculative_sites += 1,
                    Callee::Direct(_) => {}
                }

                if let Some(target) = callee.static_target() {
                    if !callees.iter().any(|c: &String| c == target) {
                        callees.push(target.to_owned());
                    }
                }
            }

            for callee in callees.iter() {
                graph
                    .callers
                    .entry(callee.clone())
                    .or_default()
                    .push(func.name().to_owned());
            }

            graph.callees.insert(func.name().to_owned(), callees);
        }

        graph
    }

    /// Gets every function statically called by `func`, in the order
    /// of their first call site. Each callee is listed once.
    pub fn callees(&self, func: &str) -> &[String] {
        self.callees.get(func).map(Vec::as_slice).unwrap_or_default()
    }

    /// Gets every function that statically calls `func`.
    pub fn callers(&self, func: &str) -> &[String] {
        self.callers.get(func).map(Vec::as_slice).unwrap_or_default()
    }

    /// Checks if anything statically calls `func`.
    pub fn has_callers(&self, func: &str) -> bool {
        !self.callers(func).is_empty()
    }

    /// Checks if `func` can (directly or indirectly) call itself.
    pub fn is_recursive(&self, func: &str) -> bool {
        self.reachable_from(self.callees(func).iter().map(String::as_str))
            .contains(func)
    }

    /// Gets every function that is reachable by following call edges from
    /// `roots`. The roots themselves are included.
    pub fn reachable_from<'a>(&self, roots: impl IntoIterator<Item = &'a str>) -> SaHashSet<String> {
        let mut seen = SaHashSet::default();
        let mut worklist: Vec<&str> = roots.into_iter().collect();

        while let Some(func) = worklist.pop() {
            if seen.insert(func.to_owned()) {
                worklist.extend(self.callees(func).iter().map(String::as_str));
            }
        }

        seen
    }

    /// The number of dynamically dispatched call sites in the module.
    pub fn virtual_call_sites(&self) -> usize {
        self.virtual_sites
    }

    /// The number of inline caches in the module.
    pub fn speculative_call_sites(&self) -> usize {
        self.speculative_sites
    }
}

/// Computes the [`CallGraph`] of a module.
pub struct CallGraphAnalysis;

impl Analysis for CallGraphAnalysis {
    type Result = CallGraph;

    fn compute(&mut self, module: &Module, _: &AnalysisCache) -> Self::Result {
        CallGraph::compute(module)
    }
}
