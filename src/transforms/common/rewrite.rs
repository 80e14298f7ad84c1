//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Definition, Inst, Value};
use crate::utility::SaHashMap;

/// Tracks the values that have been replaced by other values while
/// a function body is being rebuilt.
///
/// Instructions are expected to be visited in order, every instruction
/// gets [`Self::apply`] called on it before it is inspected.
#[derive(Debug, Default)]
pub struct Replacements {
    map: SaHashMap<Value, Value>,
}

impl Replacements {
    /// Creates an empty set of replacements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that every later use of `from` should become a use of `to`.
    pub fn replace(&mut self, from: Value, to: Value) {
        let to = self.resolve(to);

        debug_assert_ne!(from, to, "replacing a value with itself");

        self.map.insert(from, to);
    }

    /// Gets the value that `value` has been replaced by, following
    /// chains of replacements.
    pub fn resolve(&self, value: Value) -> Value {
        let mut current = value;

        while let Some(&next) = self.map.get(&current) {
            current = next;
        }

        current
    }

    /// Rewrites the operands of `inst` to refer to their replacements.
    pub fn apply(&self, inst: &mut Inst) {
        if self.map.is_empty() {
            return;
        }

        for operand in inst.operands_mut() {
            *operand = self.resolve(*operand);
        }
    }

    /// Checks if no replacements have been recorded.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Gets the index of the first terminator in the body.
pub fn first_terminator(def: &Definition) -> Option<usize> {
    def.insts().iter().position(Inst::is_terminator)
}

/// Removes every instruction after the first terminator in the body.
/// Returns the number of instructions that were removed.
pub fn truncate_after_terminator(def: &mut Definition) -> usize {
    match first_terminator(def) {
        Some(i) => {
            let before = def.len();

            def.insts_mut().truncate(i + 1);

            before - def.len()
        }
        None => 0,
    }
}
