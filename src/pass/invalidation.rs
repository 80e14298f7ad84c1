//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::AnalysisKind;
use smallvec::{smallvec, SmallVec};
use std::any::Any;

/// Models the set of analyses that a transform pass may make stale.
///
/// This is a declaration made by the pass ahead of time, not something that is
/// computed from what the pass actually did. The pass manager drops every analysis
/// named here after the pass finishes, whether or not the pass changed anything.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Invalidation {
    /// The pass never changes the module.
    Nothing,
    /// The pass may make any analysis stale. This is the conservative default.
    #[default]
    All,
    /// The pass can only make the listed analyses stale.
    Only(SmallVec<[AnalysisKind; 2]>),
}

impl Invalidation {
    /// Returns an [`Invalidation`] naming exactly the analysis `T`.
    pub fn only<T: Any>() -> Self {
        Self::Nothing.and::<T>()
    }

    /// Adds the analysis `T` to the set.
    pub fn and<T: Any>(self) -> Self {
        self.with(AnalysisKind::of::<T>())
    }

    /// Adds `kind` to the set.
    pub fn with(self, kind: AnalysisKind) -> Self {
        match self {
            Self::All => Self::All,
            Self::Nothing => Self::Only(smallvec![kind]),
            Self::Only(mut kinds) => {
                // sorted so we can binary_search in `invalidates`
                if let Err(pos) = kinds.binary_search(&kind) {
                    kinds.insert(pos, kind);
                }

                Self::Only(kinds)
            }
        }
    }

    /// Gets the union of two sets, i.e. the set of analyses that are made
    /// stale by running one pass and then the other.
    pub fn union(self, other: Invalidation) -> Self {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::Nothing, other) | (other, Self::Nothing) => other,
            (lhs, Self::Only(kinds)) => kinds.into_iter().fold(lhs, Self::with),
        }
    }

    /// Checks if the analysis of kind `kind` is made stale.
    pub fn invalidates(&self, kind: AnalysisKind) -> bool {
        match self {
            Self::Nothing => false,
            Self::All => true,
            Self::Only(kinds) => kinds.binary_search(&kind).is_ok(),
        }
    }

    /// Checks if every analysis is made stale.
    pub fn invalidates_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Checks if nothing is made stale.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct C;

    #[test]
    fn membership() {
        let set = Invalidation::only::<A>().and::<B>().and::<A>();

        assert!(set.invalidates(AnalysisKind::of::<A>()));
        assert!(set.invalidates(AnalysisKind::of::<B>()));
        assert!(!set.invalidates(AnalysisKind::of::<C>()));
        assert!(!Invalidation::Nothing.invalidates(AnalysisKind::of::<A>()));
        assert!(Invalidation::default().invalidates_all());
    }

    #[test]
    fn union() {
        let lhs = Invalidation::only::<A>();
        let rhs = Invalidation::only::<C>();

        assert_eq!(
            lhs.clone().union(rhs),
            Invalidation::only::<C>().and::<A>()
        );
        assert_eq!(
            lhs.clone().union(Invalidation::Nothing),
            Invalidation::only::<A>()
        );
        assert!(lhs.union(Invalidation::All).invalidates_all());
    }
}
