//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Fatal errors that stop a pipeline.
//!
//! Problems in the user's program are not errors in this sense, those are
//! reported through [`Diagnostics`](crate::diagnostics::Diagnostics).

use thiserror::Error;

/// An internal failure that a pipeline cannot continue past.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline or one of its managers was set up incorrectly.
    #[error("invalid pipeline configuration: {0}")]
    Configuration(String),

    /// A pass declared that it invalidates nothing, but then reported
    /// that it changed the module.
    #[error("pass `{pass}` changed the module but declared that it invalidates nothing")]
    InvalidationContract {
        /// The name of the offending pass
        pass: &'static str,
    },

    /// The module was structurally broken after some step.
    #[error("module failed verification after {after}: {}", .errors.join("; "))]
    Verification {
        /// What ran right before verification failed
        after: String,
        /// Every problem the verifier found
        errors: Vec<String>,
    },
}

/// Shorthand for results that may fail with a [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = PipelineError::Verification {
            after: "pass `dce`".to_owned(),
            errors: vec!["a".to_owned(), "b".to_owned()],
        };

        assert_eq!(
            err.to_string(),
            "module failed verification after pass `dce`: a; b"
        );
        assert_eq!(
            PipelineError::InvalidationContract { pass: "dce" }.to_string(),
            "pass `dce` changed the module but declared that it invalidates nothing"
        );
    }
}
