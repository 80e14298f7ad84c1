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

// rewrites every virtual callee that `rewrite` has an answer for
fn rewrite_virtual_calls(
    module: &mut Module,
    rewrite: impl Fn(&Class, &str) -> Option<Callee>,
) -> usize {
    let resolved: Vec<(String, usize, Callee)> = module
        .functions()
        .filter_map(|f| Some((f.name(), f.definition()?)))
        .flat_map(|(name, def)| {
            def.insts()
                .iter()
                .enumerate()
                .filter_map(|(i, inst)| match inst {
                    Inst::Call {
                        callee: Callee::Virtual { class, method },
                        ..
                    } => {
                        let class = module.class(class)?;

                        Some((name.to_owned(), i, rewrite(class, method)?))
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let count = resolved.len();

    for (name, i, target) in resolved {
        let inst = module
            .function_mut(&name)
            .and_then(Function::definition_mut)
            .and_then(|def| def.insts_mut().get_mut(i));

        if let Some(Inst::Call { callee, .. }) = inst {
            log::trace!("rewriting `{callee:?}` in `@{name}` to `{target:?}`");

            *callee = target;
        }
    }

    count
}

/// Turns virtual calls on `final` classes into direct calls.
///
/// A final class has no subclasses, so the implementation in its method
/// table is the only one that a call could ever dispatch to.
pub struct DevirtualizationPass;

impl ModuleTransformPass for DevirtualizationPass {
    fn name(&self) -> &'static str {
        "devirtualization"
    }

    fn run(&mut self, module: &mut Module, _: &AnalysisCache) -> PassResult {
        let rewritten = rewrite_virtual_calls(module, |class, method| {
            if !class.is_final() {
                return None;
            }

            class
                .implementation(method)
                .map(|target| Callee::Direct(target.to_owned()))
        });

        PassResult::new(rewritten != 0)
    }
}

/// Speculatively devirtualizes the virtual calls that
/// [`DevirtualizationPass`] can't resolve.
///
/// The call is guarded on the receiver being exactly the static class, in
/// which case the implementation from that class's method table is called
/// directly. Any other receiver falls back to dynamic dispatch.
pub struct InlineCachesPass;

impl ModuleTransformPass for InlineCachesPass {
    fn name(&self) -> &'static str {
        "inline-caches"
    }

    fn run(&mut self, module: &mut Module, _: &AnalysisCache) -> PassResult {
        let rewritten = rewrite_virtual_calls(module, |class, method| {
            class
                .implementation(method)
                .map(|expected| Callee::Speculative {
                    class: class.name().to_owned(),
                    method: method.to_owned(),
                    expected: expected.to_owned(),
                })
        });

        PassResult::new(rewritten != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> Module {
        let mut module = Module::new("test");

        module.insert_class(Class::new("Circle", true).with_method("area", "circle_area"));
        module.insert_class(Class::new("Shape", false).with_method("area", "shape_area"));

        let mut b = FunctionBuilder::new("main", 1);
        let p = b.param(0);
        let a = b.call_virtual("Circle", "area", &[p]);
        let c = b.call_virtual("Shape", "area", &[p]);
        let d = b.call_virtual("Shape", "perimeter", &[p]);
        b.call_void("use", &[a, c, d]);
        b.ret(None);
        module.insert_function(b.build());

        module
    }

    fn callees(module: &Module) -> Vec<Callee> {
        module
            .function("main")
            .unwrap()
            .definition()
            .unwrap()
            .insts()
            .iter()
            .filter_map(|inst| match inst {
                Inst::Call { callee, .. } => Some(callee.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn devirtualizes_final_classes() {
        let mut module = module();
        let am = AnalysisCache::new();

        assert!(DevirtualizationPass.run(&mut module, &am).changed());
        assert_eq!(callees(&module)[0], Callee::Direct("circle_area".into()));
        assert!(callees(&module)[1].is_virtual());
        assert!(!DevirtualizationPass.run(&mut module, &am).changed());
    }

    #[test]
    fn caches_open_classes() {
        let mut module = module();
        let am = AnalysisCache::new();

        assert!(DevirtualizationPass.run(&mut module, &am).changed());
        assert!(InlineCachesPass.run(&mut module, &am).changed());

        let callees = callees(&module);

        assert_eq!(
            callees[1],
            Callee::Speculative {
                class: "Shape".into(),
                method: "area".into(),
                expected: "shape_area".into(),
            }
        );
        assert!(callees[2].is_virtual());
    }
}
