//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![deny(
    unreachable_pub,
    missing_docs,
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]

//! # Garnet
//!
//! The pass pipeline of a mid-level optimizer: a small straight-line IR,
//! cached analyses over it, and the pass managers and pipelines that decide
//! which passes run, in what order, and how often.
//!
//! Most users only need [`pipeline::run_diagnostic_pipeline`] and
//! [`pipeline::run_optimization_pipeline`].

pub mod analysis;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod pass;
pub mod pipeline;
pub mod transforms;
pub mod utility;

pub use error::{PipelineError, Result};
