//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::*;
use smallvec::SmallVec;

/// Helper type for building a [`Function`] one instruction at a time.
///
/// ```
/// # use garnet::ir::*;
/// let mut b = FunctionBuilder::new("add_one", 1).returns_value();
/// let x = b.param(0);
/// let one = b.iconst(1);
/// let sum = b.add(x, one);
/// b.ret(Some(sum));
///
/// let f = b.build();
/// assert_eq!(f.definition().unwrap().len(), 3);
/// ```
pub struct FunctionBuilder {
    name: String,
    linkage: Linkage,
    attrs: FunctionAttrs,
    def: Definition,
}

impl FunctionBuilder {
    /// Creates a builder for a public function named `name` taking `params` parameters.
    pub fn new(name: &str, params: usize) -> Self {
        Self {
            name: name.to_owned(),
            linkage: Linkage::Public,
            attrs: FunctionAttrs::default(),
            def: Definition::new(params),
        }
    }

    /// Gives the function private linkage.
    pub fn private(mut self) -> Self {
        self.linkage = Linkage::Private;

        self
    }

    /// Marks the function as `transparent`.
    pub fn transparent(mut self) -> Self {
        self.attrs.transparent = true;

        self
    }

    /// Marks the function as never returning.
    pub fn noreturn(mut self) -> Self {
        self.attrs.noreturn = true;

        self
    }

    /// Marks the function as generic.
    pub fn generic(mut self) -> Self {
        self.attrs.generic = true;

        self
    }

    /// Marks the function as returning a value on every path.
    pub fn returns_value(mut self) -> Self {
        self.attrs.returns_value = true;

        self
    }

    /// Gets the value of the `index`th parameter.
    pub fn param(&self, index: usize) -> Value {
        self.def.params()[index]
    }

    fn define(&mut self, build: impl FnOnce(Value) -> Inst) -> Value {
        let dest = self.def.make_value();

        self.def.push(build(dest));

        dest
    }

    fn allocate(&mut self, build: impl FnOnce(Slot) -> Inst) -> Slot {
        let slot = self.def.make_slot();

        self.def.push(build(slot));

        slot
    }

    /// Emits an `iconst`.
    pub fn iconst(&mut self, value: i64) -> Value {
        self.define(|dest| Inst::Const { dest, value })
    }

    /// Emits an arithmetic instruction.
    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        self.define(|dest| Inst::Binary { dest, op, lhs, rhs })
    }

    /// Emits an `add`.
    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    /// Emits a `sub`.
    pub fn sub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    /// Emits a `mul`.
    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    /// Emits an `alloc_box`.
    pub fn alloc_box(&mut self) -> Slot {
        self.allocate(|slot| Inst::AllocBox { slot })
    }

    /// Emits an `alloc_stack`.
    pub fn alloc_stack(&mut self) -> Slot {
        self.allocate(|slot| Inst::AllocStack { slot })
    }

    /// Emits a `store`.
    pub fn store(&mut self, slot: Slot, value: Value) {
        self.def.push(Inst::Store { slot, value });
    }

    /// Emits a `load`.
    pub fn load(&mut self, slot: Slot) -> Value {
        self.define(|dest| Inst::Load { dest, slot })
    }

    /// Emits a by-reference `capture`.
    pub fn capture(&mut self, slot: Slot) -> Value {
        self.define(|dest| Inst::Capture { dest, slot })
    }

    /// Emits a by-value `capture_value`.
    pub fn capture_value(&mut self, value: Value) -> Value {
        self.define(|dest| Inst::CaptureValue { dest, value })
    }

    /// Emits a `struct`.
    pub fn structure(&mut self, fields: &[Value]) -> Value {
        self.define(|dest| Inst::Struct {
            dest,
            fields: SmallVec::from_slice(fields),
        })
    }

    /// Emits an `extract`.
    pub fn extract(&mut self, aggregate: Value, index: u32) -> Value {
        self.define(|dest| Inst::Extract {
            dest,
            aggregate,
            index,
        })
    }

    /// Emits an `enum`.
    pub fn enumeration(&mut self, case: u32, payload: Option<Value>) -> Value {
        self.define(|dest| Inst::Enum {
            dest,
            case,
            payload,
        })
    }

    /// Emits an `enum_payload`.
    pub fn enum_payload(&mut self, value: Value, case: u32) -> Value {
        self.define(|dest| Inst::EnumPayload { dest, value, case })
    }

    /// Emits a `global_addr`.
    pub fn global_addr(&mut self, global: &str) -> Value {
        self.define(|dest| Inst::GlobalAddr {
            dest,
            global: global.to_owned(),
        })
    }

    /// Emits a `retain`.
    pub fn retain(&mut self, value: Value) {
        self.def.push(Inst::Retain { value });
    }

    /// Emits a `release`.
    pub fn release(&mut self, value: Value) {
        self.def.push(Inst::Release { value });
    }

    fn push_call(
        &mut self,
        dest: Option<Value>,
        callee: Callee,
        substitution: Option<String>,
        args: &[Value],
    ) {
        self.def.push(Inst::Call {
            dest,
            callee,
            substitution,
            args: SmallVec::from_slice(args),
        });
    }

    /// Emits a direct call whose result is used.
    pub fn call(&mut self, callee: &str, args: &[Value]) -> Value {
        let dest = self.def.make_value();

        self.push_call(Some(dest), Callee::Direct(callee.to_owned()), None, args);

        dest
    }

    /// Emits a direct call whose result is ignored.
    pub fn call_void(&mut self, callee: &str, args: &[Value]) {
        self.push_call(None, Callee::Direct(callee.to_owned()), None, args);
    }

    /// Emits a direct call to a generic function with a substitution.
    pub fn call_generic(&mut self, callee: &str, substitution: &str, args: &[Value]) -> Value {
        let dest = self.def.make_value();
        let callee = Callee::Direct(callee.to_owned());

        self.push_call(Some(dest), callee, Some(substitution.to_owned()), args);

        dest
    }

    /// Emits a dynamically dispatched call through `class`'s method table.
    pub fn call_virtual(&mut self, class: &str, method: &str, args: &[Value]) -> Value {
        let dest = self.def.make_value();
        let callee = Callee::Virtual {
            class: class.to_owned(),
            method: method.to_owned(),
        };

        self.push_call(Some(dest), callee, None, args);

        dest
    }

    /// Emits an `unreachable`.
    pub fn unreachable(&mut self) {
        self.def.push(Inst::Unreachable);
    }

    /// Emits a `ret`.
    pub fn ret(&mut self, value: Option<Value>) {
        self.def.push(Inst::Return { value });
    }

    /// Finishes building the function.
    pub fn build(self) -> Function {
        Function::new(&self.name, self.linkage, self.attrs, self.def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_in_order() {
        let mut b = FunctionBuilder::new("f", 1).private().transparent();
        let slot = b.alloc_stack();
        let p = b.param(0);
        b.store(slot, p);
        let x = b.load(slot);
        let y = b.call("g", &[x]);
        b.ret(Some(y));

        let f = b.build();
        let def = f.definition().unwrap();

        assert_eq!(f.linkage(), Linkage::Private);
        assert!(f.attrs().transparent);
        assert_eq!(
            def.insts().iter().map(Inst::opcode).collect::<Vec<_>>(),
            ["alloc_stack", "store", "load", "call", "ret"]
        );
        assert_eq!(def.value_count(), 3);
        assert_eq!(def.slot_count(), 1);
    }

    #[test]
    fn display() {
        let mut b = FunctionBuilder::new("main", 0);
        let v = b.iconst(4);
        b.call_void("print", &[v]);
        b.ret(None);

        assert_eq!(
            b.build().to_string(),
            "fn @main() {\n  %0 = iconst 4\n  call @print(%0)\n  ret\n}\n"
        );
    }
}
