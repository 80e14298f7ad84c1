//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Contains the analysis cache and the core analyses that every
//! pipeline registers.
//!
//! Analyses model the [`Analysis`] trait, and are only ever accessed through an
//! [`AnalysisCache`] which computes them lazily and keeps their results around
//! until a transform invalidates them.

mod alias;
mod cache;
mod callgraph;
mod dominance;

pub use alias::*;
pub use cache::*;
pub use callgraph::*;
pub use dominance::*;
