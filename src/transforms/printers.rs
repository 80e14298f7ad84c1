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
use crate::ir::Module;
use crate::pass::{Invalidation, ModuleTransformPass, PassResult};
use std::io;

/// This is a pass that writes out the number of instructions in every
/// function of a module to a given stream. It never modifies the module.
///
/// ```none
/// module `main`: 12 instruction(s)
///   @main: 9
///   @helper: 3
/// ```
pub struct InstCountPass {
    out: Box<dyn io::Write>,
}

impl InstCountPass {
    /// Shorthand for a writer that prints to [`std::io::stdout`].
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    /// Shorthand for a writer that prints to [`std::io::stderr`].
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }

    /// Creates an instance of the pass with a given writer.
    ///
    /// This writer will be where the report is printed out when the pass
    /// is run over the IR.
    pub fn with_writer<T: io::Write + 'static>(writer: T) -> Self {
        Self {
            out: Box::new(writer),
        }
    }

    fn report(&mut self, module: &Module) -> io::Result<()> {
        writeln!(
            self.out,
            "module `{}`: {} instruction(s)",
            module.name(),
            module.inst_count()
        )?;

        for func in module.functions() {
            match func.definition() {
                Some(def) => writeln!(self.out, "  @{}: {}", func.name(), def.len())?,
                None => writeln!(self.out, "  @{}: declaration", func.name())?,
            }
        }

        self.out.flush()
    }
}

impl ModuleTransformPass for InstCountPass {
    fn name(&self) -> &'static str {
        "inst-count"
    }

    fn invalidates(&self) -> Invalidation {
        Invalidation::Nothing
    }

    fn run(&mut self, module: &mut Module, _: &AnalysisCache) -> PassResult {
        if let Err(err) = self.report(module) {
            log::warn!("unable to write instruction counts: {err}");
        }

        PassResult::unchanged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, FunctionAttrs, FunctionBuilder};
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_report() {
        let mut module = Module::new("test");
        let mut b = FunctionBuilder::new("main", 0);
        let x = b.iconst(1);
        b.ret(Some(x));
        module.insert_function(b.build());
        module.insert_function(Function::declaration("print", FunctionAttrs::default()));

        let buffer = SharedBuffer::default();
        let mut pass = InstCountPass::with_writer(buffer.clone());
        let before = module.to_string();

        assert!(!pass.run(&mut module, &AnalysisCache::new()).changed());
        assert_eq!(module.to_string(), before);
        assert_eq!(
            String::from_utf8(buffer.0.borrow().clone()).unwrap(),
            "module `test`: 2 instruction(s)\n  @main: 2\n  @print: declaration\n"
        );
    }
}
