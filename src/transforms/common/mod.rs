//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Utilities shared between several of the transform passes.

mod memory;
mod rewrite;

pub use memory::*;
pub use rewrite::*;

use crate::analysis::{AliasAnalysis, DominanceAnalysis};
use crate::pass::Invalidation;

/// The invalidation scope of a pass that rewrites function bodies, but never
/// adds or removes call sites.
pub fn body_local() -> Invalidation {
    Invalidation::only::<AliasAnalysis>().and::<DominanceAnalysis>()
}
