//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Slot, Value};
use smallvec::SmallVec;
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The arithmetic operations supported by [`Inst::Binary`].
///
/// All of these are checked, an overflow at runtime traps.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    /// `lhs + rhs`
    Add,
    /// `lhs - rhs`
    Sub,
    /// `lhs * rhs`
    Mul,
}

impl BinaryOp {
    /// Evaluates the operation over two constants. Returns `None` if the
    /// operation overflows.
    pub fn evaluate(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            BinaryOp::Add => lhs.checked_add(rhs),
            BinaryOp::Sub => lhs.checked_sub(rhs),
            BinaryOp::Mul => lhs.checked_mul(rhs),
        }
    }

    /// Gets the textual name of the operation.
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
        }
    }
}

/// The target of a [`Inst::Call`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Callee {
    /// A call to a function known by name.
    Direct(String),
    /// A dynamically dispatched call through a class's method table.
    Virtual {
        /// The static class of the receiver
        class: String,
        /// The method being called
        method: String,
    },
    /// An inline cache: a guarded direct call to `expected`, falling back
    /// to dynamic dispatch if the receiver isn't exactly `class`.
    Speculative {
        /// The class that the cache is guarded on
        class: String,
        /// The method being called
        method: String,
        /// The implementation called when the guard succeeds
        expected: String,
    },
}

impl Callee {
    /// Gets the function that is statically known to be called, if there is one.
    ///
    /// Inline caches report their expected target here.
    pub fn static_target(&self) -> Option<&str> {
        match self {
            Callee::Direct(name) => Some(name),
            Callee::Speculative { expected, .. } => Some(expected),
            Callee::Virtual { .. } => None,
        }
    }

    /// Checks if the call is fully dynamic.
    pub fn is_virtual(&self) -> bool {
        matches!(self, Callee::Virtual { .. })
    }
}

/// A single instruction inside of a [`Definition`](crate::ir::Definition).
///
/// Bodies are straight-line, the only control flow is the end of the function
/// (`return`) or a trap (`unreachable`).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Inst {
    /// `%dest = iconst value`
    Const {
        /// The result
        dest: Value,
        /// The constant being materialized
        value: i64,
    },
    /// `%dest = <op> %lhs, %rhs`
    Binary {
        /// The result
        dest: Value,
        /// The operation
        op: BinaryOp,
        /// The left operand
        lhs: Value,
        /// The right operand
        rhs: Value,
    },
    /// Allocates a reference-counted heap box.
    AllocBox {
        /// The slot being created
        slot: Slot,
    },
    /// Allocates a slot on the stack.
    AllocStack {
        /// The slot being created
        slot: Slot,
    },
    /// Writes `value` into `slot`.
    Store {
        /// The slot written to
        slot: Slot,
        /// The value written
        value: Value,
    },
    /// Reads the current contents of `slot`.
    Load {
        /// The result
        dest: Value,
        /// The slot read from
        slot: Slot,
    },
    /// Creates a closure context that captures `slot` by reference. The slot
    /// escapes the function once this is executed.
    Capture {
        /// The closure context
        dest: Value,
        /// The captured slot
        slot: Slot,
    },
    /// Creates a closure context that captures a copy of `value`.
    CaptureValue {
        /// The closure context
        dest: Value,
        /// The captured value
        value: Value,
    },
    /// Builds an aggregate out of a list of fields.
    Struct {
        /// The result
        dest: Value,
        /// The fields, in order
        fields: SmallVec<[Value; 4]>,
    },
    /// Reads field `index` out of an aggregate.
    Extract {
        /// The result
        dest: Value,
        /// The aggregate being read from
        aggregate: Value,
        /// The field index
        index: u32,
    },
    /// Builds an enum value with a given case and an optional payload.
    Enum {
        /// The result
        dest: Value,
        /// The case discriminator
        case: u32,
        /// The payload of the case, if it has one
        payload: Option<Value>,
    },
    /// Projects the payload out of an enum value that is known to be `case`.
    EnumPayload {
        /// The result
        dest: Value,
        /// The enum value
        value: Value,
        /// The case being projected
        case: u32,
    },
    /// Gets the address of a global, running its lazy initializer on first use.
    GlobalAddr {
        /// The result
        dest: Value,
        /// The name of the global
        global: String,
    },
    /// Increments the reference count of `value`.
    Retain {
        /// The value being retained
        value: Value,
    },
    /// Decrements the reference count of `value`.
    Release {
        /// The value being released
        value: Value,
    },
    /// Calls a function.
    Call {
        /// The result, if the call result is used
        dest: Option<Value>,
        /// What is being called
        callee: Callee,
        /// A generic substitution applied to the callee, if the callee is generic
        substitution: Option<String>,
        /// The arguments
        args: SmallVec<[Value; 4]>,
    },
    /// Traps.
    Unreachable,
    /// Returns from the function.
    Return {
        /// The returned value, if there is one
        value: Option<Value>,
    },
}

impl Inst {
    /// Gets the value defined by the instruction, if there is one.
    pub fn result(&self) -> Option<Value> {
        match self {
            Inst::Const { dest, .. }
            | Inst::Binary { dest, .. }
            | Inst::Load { dest, .. }
            | Inst::Capture { dest, .. }
            | Inst::CaptureValue { dest, .. }
            | Inst::Struct { dest, .. }
            | Inst::Extract { dest, .. }
            | Inst::Enum { dest, .. }
            | Inst::EnumPayload { dest, .. }
            | Inst::GlobalAddr { dest, .. } => Some(*dest),
            Inst::Call { dest, .. } => *dest,
            _ => None,
        }
    }

    /// Gets mutable access to the value defined by the instruction, if there is one.
    pub fn result_mut(&mut self) -> Option<&mut Value> {
        match self {
            Inst::Const { dest, .. }
            | Inst::Binary { dest, .. }
            | Inst::Load { dest, .. }
            | Inst::Capture { dest, .. }
            | Inst::CaptureValue { dest, .. }
            | Inst::Struct { dest, .. }
            | Inst::Extract { dest, .. }
            | Inst::Enum { dest, .. }
            | Inst::EnumPayload { dest, .. }
            | Inst::GlobalAddr { dest, .. } => Some(dest),
            Inst::Call { dest, .. } => dest.as_mut(),
            _ => None,
        }
    }

    /// Gets the slot that the instruction allocates or accesses, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            Inst::AllocBox { slot }
            | Inst::AllocStack { slot }
            | Inst::Store { slot, .. }
            | Inst::Load { slot, .. }
            | Inst::Capture { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    /// Gets mutable access to the slot that the instruction allocates or accesses.
    pub fn slot_mut(&mut self) -> Option<&mut Slot> {
        match self {
            Inst::AllocBox { slot }
            | Inst::AllocStack { slot }
            | Inst::Store { slot, .. }
            | Inst::Load { slot, .. }
            | Inst::Capture { slot, .. } => Some(slot),
            _ => None,
        }
    }

    /// Gets the slot created by the instruction if it's an allocation.
    pub fn allocated_slot(&self) -> Option<Slot> {
        match self {
            Inst::AllocBox { slot } | Inst::AllocStack { slot } => Some(*slot),
            _ => None,
        }
    }

    /// Gets every value used by the instruction, in order.
    pub fn operands(&self) -> SmallVec<[Value; 4]> {
        let mut operands = SmallVec::new();

        match self {
            Inst::Binary { lhs, rhs, .. } => {
                operands.push(*lhs);
                operands.push(*rhs);
            }
            Inst::Store { value, .. }
            | Inst::CaptureValue { value, .. }
            | Inst::EnumPayload { value, .. }
            | Inst::Retain { value }
            | Inst::Release { value } => operands.push(*value),
            Inst::Struct { fields, .. } => operands.extend_from_slice(fields),
            Inst::Extract { aggregate, .. } => operands.push(*aggregate),
            Inst::Enum { payload, .. } => operands.extend(payload.iter().copied()),
            Inst::Call { args, .. } => operands.extend_from_slice(args),
            Inst::Return { value } => operands.extend(value.iter().copied()),
            _ => {}
        }

        operands
    }

    /// Gets mutable references to every value used by the instruction.
    pub fn operands_mut(&mut self) -> SmallVec<[&mut Value; 4]> {
        let mut operands = SmallVec::new();

        match self {
            Inst::Binary { lhs, rhs, .. } => {
                operands.push(lhs);
                operands.push(rhs);
            }
            Inst::Store { value, .. }
            | Inst::CaptureValue { value, .. }
            | Inst::EnumPayload { value, .. }
            | Inst::Retain { value }
            | Inst::Release { value } => operands.push(value),
            Inst::Struct { fields, .. } => operands.extend(fields.iter_mut()),
            Inst::Extract { aggregate, .. } => operands.push(aggregate),
            Inst::Enum { payload, .. } => operands.extend(payload.iter_mut()),
            Inst::Call { args, .. } => operands.extend(args.iter_mut()),
            Inst::Return { value } => operands.extend(value.iter_mut()),
            _ => {}
        }

        operands
    }

    /// Rewrites every use of `from` into a use of `to`. Returns whether
    /// anything was rewritten.
    pub fn replace_uses(&mut self, from: Value, to: Value) -> bool {
        let mut replaced = false;

        for operand in self.operands_mut() {
            if *operand == from {
                *operand = to;
                replaced = true;
            }
        }

        replaced
    }

    /// Checks if the instruction ends the function.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Inst::Unreachable | Inst::Return { .. })
    }

    /// Checks if the instruction has an effect beyond producing its result
    /// (or allocating its slot). Instructions without side effects can be
    /// removed once their result is unused.
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            Inst::Store { .. }
                | Inst::GlobalAddr { .. }
                | Inst::Retain { .. }
                | Inst::Release { .. }
                | Inst::Call { .. }
                | Inst::Unreachable
                | Inst::Return { .. }
        )
    }

    /// Gets the textual name of the instruction.
    pub fn opcode(&self) -> &'static str {
        match self {
            Inst::Const { .. } => "iconst",
            Inst::Binary { op, .. } => op.mnemonic(),
            Inst::AllocBox { .. } => "alloc_box",
            Inst::AllocStack { .. } => "alloc_stack",
            Inst::Store { .. } => "store",
            Inst::Load { .. } => "load",
            Inst::Capture { .. } => "capture",
            Inst::CaptureValue { .. } => "capture_value",
            Inst::Struct { .. } => "struct",
            Inst::Extract { .. } => "extract",
            Inst::Enum { .. } => "enum",
            Inst::EnumPayload { .. } => "enum_payload",
            Inst::GlobalAddr { .. } => "global_addr",
            Inst::Retain { .. } => "retain",
            Inst::Release { .. } => "release",
            Inst::Call { .. } => "call",
            Inst::Unreachable => "unreachable",
            Inst::Return { .. } => "ret",
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }

        write!(f, "{value}")?;
    }

    Ok(())
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dest) = self.result() {
            write!(f, "{dest} = ")?;
        }

        write!(f, "{}", self.opcode())?;

        match self {
            Inst::Const { value, .. } => write!(f, " {value}"),
            Inst::Binary { lhs, rhs, .. } => write!(f, " {lhs}, {rhs}"),
            Inst::AllocBox { slot } | Inst::AllocStack { slot } => write!(f, " {slot}"),
            Inst::Store { slot, value } => write!(f, " {value} to {slot}"),
            Inst::Load { slot, .. } | Inst::Capture { slot, .. } => write!(f, " {slot}"),
            Inst::CaptureValue { value, .. } => write!(f, " {value}"),
            Inst::Struct { fields, .. } => {
                write!(f, " (")?;
                write_list(f, fields)?;
                write!(f, ")")
            }
            Inst::Extract {
                aggregate, index, ..
            } => write!(f, " {aggregate}, {index}"),
            Inst::Enum { case, payload, .. } => match payload {
                Some(payload) => write!(f, " #{case}({payload})"),
                None => write!(f, " #{case}"),
            },
            Inst::EnumPayload { value, case, .. } => write!(f, " {value}, #{case}"),
            Inst::GlobalAddr { global, .. } => write!(f, " @{global}"),
            Inst::Retain { value } | Inst::Release { value } => write!(f, " {value}"),
            Inst::Call {
                callee,
                substitution,
                args,
                ..
            } => {
                match callee {
                    Callee::Direct(name) => write!(f, " @{name}")?,
                    Callee::Virtual { class, method } => write!(f, " virtual {class}.{method}")?,
                    Callee::Speculative {
                        class,
                        method,
                        expected,
                    } => write!(f, " cached {class}.{method} -> @{expected}")?,
                }

                if let Some(ty) = substitution {
                    write!(f, "<{ty}>")?;
                }

                write!(f, "(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Inst::Unreachable => Ok(()),
            Inst::Return { value } => match value {
                Some(value) => write!(f, " {value}"),
                None => Ok(()),
            },
        }
    }
}
