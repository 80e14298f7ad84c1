//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The two pipelines that a module goes through.
//!
//! The diagnostic pipeline runs first, and turns a [`Raw`](crate::ir::Stage::Raw)
//! module into a [`Canonical`](crate::ir::Stage::Canonical) one while reporting
//! any errors in the user's program. The optimization pipeline then runs over
//! canonical modules to prepare them for code generation.
//!
//! ```
//! # use garnet::ir::*;
//! # use garnet::pipeline::*;
//! let mut module = Module::new("main");
//! let mut b = FunctionBuilder::new("main", 0);
//! b.ret(None);
//! module.insert_function(b.build());
//!
//! let options = PipelineOptions::default();
//!
//! assert_eq!(run_diagnostic_pipeline(&mut module, &options), Ok(false));
//! assert_eq!(run_optimization_pipeline(&mut module, &options), Ok(()));
//! ```

mod driver;
mod gate;
mod options;
mod registry;

pub use driver::*;
pub use gate::*;
pub use options::*;
pub use registry::*;
