//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Defines the "transform" passes in garnet's infrastructure.
//!
//! These are the passes that can (potentially) modify a module, and don't
//! actually logically yield a result.
//!
//! Some of these "transforms" are not actually transformations (e.g. the
//! verify pass and the diagnostic checkers are "transform passes" even though
//! they manipulate no IR), but most of them are. The diagnostic ones report
//! problems through the [`Diagnostics`](crate::diagnostics::Diagnostics) they
//! return.

pub mod common;

mod aggregates;
mod arc;
mod combine;
mod constprop;
mod cse;
mod dce;
mod devirtualize;
mod dfe;
mod diagnose;
mod inliner;
mod linker;
mod memory;
mod printers;
mod simplifycfg;
mod specialize;
mod verify;

pub use aggregates::*;
pub use arc::*;
pub use combine::*;
pub use constprop::*;
pub use cse::*;
pub use dce::*;
pub use devirtualize::*;
pub use dfe::*;
pub use diagnose::*;
pub use inliner::*;
pub use linker::*;
pub use memory::*;
pub use printers::*;
pub use simplifycfg::*;
pub use specialize::*;
pub use verify::*;
