//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Defines the pass infrastructure that the pipelines are built out of.
//!
//! Passes at their core are just objects that take in IR and report
//! whether they changed it:
//!
//! ```
//! # use garnet::ir::Module;
//! struct Pass { /* ... */ }
//!
//! impl Pass {
//!     fn run(&mut self, ir: &mut Module) -> bool { /* ... */ false }
//! }
//! ```
//!
//! # Transform Passes
//! Transform passes are allowed to take a `&mut self` to manipulate internal
//! state during the run (and potentially across runs), but they should always
//! act as-if they were pure functions. Multiple runs of the same pass over
//! the same IR should produce the same output.
//!
//! Every transform declares ahead of time which analyses it may make stale
//! through an [`Invalidation`]. This is conservatively "everything" unless the
//! pass says otherwise. A pass that declares [`Invalidation::Nothing`] and then
//! reports a change is a bug, and stops the pipeline.
//!
//! # Pass Managers
//! A [`PassManager`] owns an ordered list of passes and an
//! [`AnalysisCache`](crate::analysis::AnalysisCache). It runs the passes
//! strictly in order, once, a fixed number of times, or until the module stops
//! changing (with an upper bound, see [`IterationPolicy`]).

mod invalidation;
mod manager;
mod transform;

pub use invalidation::*;
pub use manager::*;
pub use transform::*;
