//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::diagnostics::Diagnostics;
use crate::ir::Function;
use crate::pass::FunctionTransformPass;
use crate::transforms::common;

/// Removes code that can never be reached.
///
/// Bodies are straight-line, so the only unreachable code is whatever
/// follows the first `ret` or `unreachable`. Unlike
/// [`DiagnoseUnreachablePass`](crate::transforms::DiagnoseUnreachablePass)
/// this does so silently.
pub struct SimplifyCfgPass;

impl FunctionTransformPass for SimplifyCfgPass {
    fn name(&self) -> &'static str {
        "simplify-cfg"
    }

    fn run(&mut self, func: &mut Function, _: &mut Diagnostics) -> bool {
        func.definition_mut()
            .map_or(0, common::truncate_after_terminator)
            != 0
    }
}
