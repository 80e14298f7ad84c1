//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Inst, Slot, Value};
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Models the visibility of a function outside of its module.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Linkage {
    /// Visible to other modules. Public functions are never removed.
    Public,
    /// Only visible inside of the module, and can be removed once
    /// nothing refers to it anymore.
    Private,
}

/// The attributes that can be applied to a function.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct FunctionAttrs {
    /// The function must be inlined into every caller before diagnostics run.
    pub transparent: bool,
    /// The function never returns to its caller.
    pub noreturn: bool,
    /// The function has generic parameters and needs a substitution to be called.
    pub generic: bool,
    /// The function is expected to return a value on every path.
    pub returns_value: bool,
}

/// The body of a function.
///
/// Every definition owns its own value and slot numbering, new values
/// and slots need to be created through [`Self::make_value`] and
/// [`Self::make_slot`] to keep that numbering dense.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Definition {
    params: Vec<Value>,
    insts: Vec<Inst>,
    next_value: u32,
    next_slot: u32,
}

impl Definition {
    /// Creates an empty body with `params` parameters. The parameters
    /// are given the values `%0` through `%{params - 1}`.
    pub fn new(params: usize) -> Self {
        let mut def = Self::default();

        for _ in 0..params {
            let param = def.make_value();

            def.params.push(param);
        }

        def
    }

    /// Gets the parameters of the function.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Gets the instructions in the body, in execution order.
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    /// Gets mutable access to the list of instructions.
    pub fn insts_mut(&mut self) -> &mut Vec<Inst> {
        &mut self.insts
    }

    /// Appends an instruction to the end of the body.
    pub fn push(&mut self, inst: Inst) {
        self.insts.push(inst);
    }

    /// The number of instructions in the body.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Checks if the body has any instructions.
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Creates a new value that has never been used in this body.
    pub fn make_value(&mut self) -> Value {
        let value = Value::new(self.next_value as usize);

        self.next_value += 1;

        value
    }

    /// Creates a new slot that has never been used in this body.
    pub fn make_slot(&mut self) -> Slot {
        let slot = Slot::new(self.next_slot as usize);

        self.next_slot += 1;

        slot
    }

    /// Gets the number of values that have been created in this body. Every
    /// value in the body has an index lower than this.
    pub fn value_count(&self) -> usize {
        self.next_value as usize
    }

    /// Gets the number of slots that have been created in this body.
    pub fn slot_count(&self) -> usize {
        self.next_slot as usize
    }

    /// Gets the index of the instruction that defines `value`. Parameters
    /// are not defined by any instruction.
    pub fn defining_index(&self, value: Value) -> Option<usize> {
        self.insts
            .iter()
            .position(|inst| inst.result() == Some(value))
    }

    /// Gets the instruction that defines `value`.
    pub fn defining_inst(&self, value: Value) -> Option<&Inst> {
        self.defining_index(value).map(|i| &self.insts[i])
    }

    /// Rewrites every use of `from` to be a use of `to`, returning the number
    /// of instructions that were changed.
    pub fn replace_all_uses(&mut self, from: Value, to: Value) -> usize {
        self.insts
            .iter_mut()
            .map(|inst| inst.replace_uses(from, to))
            .filter(|replaced| *replaced)
            .count()
    }

    /// Counts the number of operands that refer to `value`.
    pub fn use_count(&self, value: Value) -> usize {
        self.insts
            .iter()
            .flat_map(|inst| inst.operands())
            .filter(|operand| *operand == value)
            .count()
    }
}

/// A single function in a [`Module`](crate::ir::Module).
///
/// A function without a [`Definition`] is a declaration, it refers to code
/// that lives in another module (or that hasn't been loaded yet).
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Function {
    name: String,
    linkage: Linkage,
    attrs: FunctionAttrs,
    definition: Option<Definition>,
}

impl Function {
    /// Creates a function with a given body.
    pub fn new(name: &str, linkage: Linkage, attrs: FunctionAttrs, definition: Definition) -> Self {
        Self {
            name: name.to_owned(),
            linkage,
            attrs,
            definition: Some(definition),
        }
    }

    /// Creates a public function without a body.
    pub fn declaration(name: &str, attrs: FunctionAttrs) -> Self {
        Self {
            name: name.to_owned(),
            linkage: Linkage::Public,
            attrs,
            definition: None,
        }
    }

    /// Gets the name of the function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the linkage of the function.
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Changes the linkage of the function.
    pub fn set_linkage(&mut self, linkage: Linkage) {
        self.linkage = linkage;
    }

    /// Gets the attributes of the function.
    pub fn attrs(&self) -> FunctionAttrs {
        self.attrs
    }

    /// Gets mutable access to the function's attributes.
    pub fn attrs_mut(&mut self) -> &mut FunctionAttrs {
        &mut self.attrs
    }

    /// Gets the body of the function, if it has one.
    pub fn definition(&self) -> Option<&Definition> {
        self.definition.as_ref()
    }

    /// Gets the body of the function, if it has one.
    pub fn definition_mut(&mut self) -> Option<&mut Definition> {
        self.definition.as_mut()
    }

    /// Gives the function a body, replacing the old one if it existed.
    pub fn define(&mut self, definition: Definition) {
        self.definition = Some(definition);
    }

    /// Checks if the function has no body.
    pub fn is_declaration(&self) -> bool {
        self.definition.is_none()
    }

    /// Creates a copy of the function with a different name.
    pub fn clone_as(&self, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let def = match &self.definition {
            Some(def) => def,
            None => return writeln!(f, "decl @{}", self.name),
        };

        write!(f, "fn @{}(", self.name)?;

        for (i, param) in def.params().iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }

            write!(f, "{param}")?;
        }

        writeln!(f, ") {{")?;

        for inst in def.insts() {
            writeln!(f, "  {inst}")?;
        }

        writeln!(f, "}}")
    }
}
