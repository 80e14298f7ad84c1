//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! User-facing diagnostics reported by passes.
//!
//! Passes never touch any shared error state, every pass hands back the
//! diagnostics it found as part of its result. These get merged by the pass
//! manager and finally recorded on the module by the pipeline driver.

use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// How serious a diagnostic is.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Severity {
    /// Something suspicious, compilation continues normally.
    Warning,
    /// The program is invalid. Compilation continues so that as many errors
    /// as possible get reported, but the result can't be used.
    Error,
}

/// A single diagnostic, attached to the function it was found in.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    severity: Severity,
    function: Option<String>,
    message: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    pub fn new(severity: Severity, function: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity,
            function: function.map(str::to_owned),
            message: message.into(),
        }
    }

    /// Gets the severity of the diagnostic.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Gets the name of the function the diagnostic was reported in, if there is one.
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    /// Gets the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Checks if the diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        match &self.function {
            Some(func) => write!(f, "{severity}: in `@{func}`: {}", self.message),
            None => write!(f, "{severity}: {}", self.message),
        }
    }
}

/// An ordered, append-only list of diagnostics.
///
/// Nothing is ever removed from a [`Diagnostics`] except by consuming
/// it, so once an error has been reported it stays reported.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports an error in `function`.
    pub fn error(&mut self, function: &str, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Error, Some(function), message));
    }

    /// Reports a warning in `function`.
    pub fn warning(&mut self, function: &str, message: impl Into<String>) {
        self.push(Diagnostic::new(Severity::Warning, Some(function), message));
    }

    /// Appends a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Appends every diagnostic in `other`, keeping their order.
    pub fn merge(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Checks if any of the diagnostics are errors.
    pub fn had_error(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    /// Counts the errors.
    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|d| d.is_error()).count()
    }

    /// Counts the warnings.
    pub fn warning_count(&self) -> usize {
        self.entries.len() - self.error_count()
    }

    /// The total number of diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if there are no diagnostics.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the diagnostics in the order they were reported.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
