//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// How many times the SSA phase of the performance pipeline runs before
/// giving up on reaching a fixed point.
///
/// This is a heuristic. Devirtualization, specialization and inlining feed each
/// other for a few rounds and then stop producing much, nothing proves that
/// three rounds reach a fixed point.
pub const DEFAULT_SSA_ITERATIONS: usize = 3;

/// The configuration for both pipelines.
///
/// This effectively models the `-Xfrontend -thing` argument pattern, every
/// option is a plain field with a builder-style setter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PipelineOptions {
    /// The module is only being round-tripped through serialization. Both pipelines
    /// are cut down to the bare minimum (mandatory inlining and linking).
    pub debug_serialization: bool,
    /// Print an instruction count report at the end of the performance pipeline.
    pub print_inst_counts: bool,
    /// Run the structural verifier at the end of the performance pipeline.
    pub verify: bool,
    /// The upper bound on iterations of the SSA phase.
    pub ssa_iterations: usize,
}

impl PipelineOptions {
    /// Sets [`Self::debug_serialization`].
    pub fn debug_serialization(self, value: bool) -> Self {
        Self {
            debug_serialization: value,
            ..self
        }
    }

    /// Sets [`Self::print_inst_counts`].
    pub fn print_inst_counts(self, value: bool) -> Self {
        Self {
            print_inst_counts: value,
            ..self
        }
    }

    /// Sets [`Self::verify`].
    pub fn verify(self, value: bool) -> Self {
        Self {
            verify: value,
            ..self
        }
    }

    /// Sets [`Self::ssa_iterations`].
    pub fn ssa_iterations(self, value: usize) -> Self {
        Self {
            ssa_iterations: value,
            ..self
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            debug_serialization: false,
            print_inst_counts: false,
            verify: cfg!(debug_assertions),
            ssa_iterations: DEFAULT_SSA_ITERATIONS,
        }
    }
}

/// Which shape of pipeline a driver builds.
///
/// This is decided once, before either pipeline assembles its pass list.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PipelineMode {
    /// Every phase of both pipelines.
    Full,
    /// Only mandatory inlining for diagnostics, and only linking for optimization.
    DebugSerialization,
}

impl PipelineMode {
    /// Decides the mode for a set of options.
    pub fn from_options(options: &PipelineOptions) -> Self {
        if options.debug_serialization {
            Self::DebugSerialization
        } else {
            Self::Full
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = PipelineOptions::default();

        assert_eq!(options.ssa_iterations, DEFAULT_SSA_ITERATIONS);
        assert_eq!(PipelineMode::from_options(&options), PipelineMode::Full);
        assert_eq!(
            PipelineMode::from_options(&options.debug_serialization(true)),
            PipelineMode::DebugSerialization
        );
    }

    #[cfg(feature = "enable-serde")]
    #[test]
    fn serialization() {
        use serde_test::{assert_tokens, Token};

        let options = PipelineOptions::default()
            .verify(false)
            .print_inst_counts(true)
            .ssa_iterations(5);

        assert_tokens(
            &options,
            &[
                Token::Struct {
                    name: "PipelineOptions",
                    len: 4,
                },
                Token::Str("debug_serialization"),
                Token::Bool(false),
                Token::Str("print_inst_counts"),
                Token::Bool(true),
                Token::Str("verify"),
                Token::Bool(false),
                Token::Str("ssa_iterations"),
                Token::U64(5),
                Token::StructEnd,
            ],
        );
    }
}
