//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Module, Stage};

/// What the [`StageGate`] decided about a module.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GateDecision {
    /// The diagnostic pipeline should run.
    Run,
    /// The module has already been through the diagnostic pipeline.
    Skip,
}

/// Decides whether the diagnostic pipeline still needs to run over a module.
///
/// The diagnostic passes only ever run once per module, a module that is
/// already [`Stage::Canonical`] is skipped entirely.
pub struct StageGate;

impl StageGate {
    /// Checks a module against the gate.
    pub fn check(module: &Module) -> GateDecision {
        let decision = match module.stage() {
            Stage::Raw => GateDecision::Run,
            Stage::Canonical => GateDecision::Skip,
        };

        log::debug!(
            "stage gate for `{}` at {:?}: {decision:?}",
            module.name(),
            module.stage()
        );

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_canonical() {
        let mut module = Module::new("test");

        assert_eq!(StageGate::check(&module), GateDecision::Run);
        module.set_stage(Stage::Canonical);
        assert_eq!(StageGate::check(&module), GateDecision::Skip);
    }
}
