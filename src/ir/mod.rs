//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Provides the types required to represent and manipulate the IR
//! that the pipelines operate on.
//!
//! Function bodies are straight-line lists of instructions, functions
//! refer to each other by name and the module owns everything.

mod builders;
mod entities;
mod function;
mod instruction;
mod module;

pub use builders::*;
pub use entities::*;
pub use function::*;
pub use instruction::*;
pub use module::*;
