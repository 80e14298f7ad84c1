//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::error::{PipelineError, Result};
use crate::ir::Module;
use crate::pass::Invalidation;
use crate::utility::SaHashMap;
use smallvec::SmallVec;
use std::any::{self, Any, TypeId};
use std::cell::{Cell, Ref, RefCell};
use std::fmt;

/// Identifies a kind of analysis.
///
/// This is just the [`TypeId`] of the analysis type, with a name attached for
/// logging and error messages.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AnalysisKind {
    id: TypeId,
    name: &'static str,
}

impl AnalysisKind {
    /// Gets the kind that identifies `T`.
    pub fn of<T: Any>() -> Self {
        let full = any::type_name::<T>();

        Self {
            id: TypeId::of::<T>(),
            name: full.rsplit("::").next().unwrap_or(full),
        }
    }

    /// Gets the name of the analysis type, without its module path.
    pub fn name(self) -> &'static str {
        self.name
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A cacheable, read-only query over a [`Module`].
///
/// Analyses are registered with an [`AnalysisCache`] and are then computed
/// lazily, the first time that a pass asks for them. The result stays cached
/// until a pass invalidates the analysis.
pub trait Analysis: Any {
    /// The result type of the analysis.
    type Result: Any;

    /// Declares the analyses that this analysis reads while computing itself.
    ///
    /// If any of them are invalidated, this analysis is invalidated
    /// along with them.
    fn dependencies(&self) -> SmallVec<[AnalysisKind; 2]> {
        SmallVec::new()
    }

    /// Performs the analysis. This should act as-if it was pure, computing the
    /// analysis twice on the same module should produce the same result.
    ///
    /// Other analyses can be requested through `am`.
    fn compute(&mut self, module: &Module, am: &AnalysisCache) -> Self::Result;
}

trait ErasedAnalysis {
    fn compute(&mut self, module: &Module, am: &AnalysisCache) -> Box<dyn Any>;
}

struct AnalysisWrapper<T> {
    inner: T,
}

impl<T: Analysis> ErasedAnalysis for AnalysisWrapper<T> {
    fn compute(&mut self, module: &Module, am: &AnalysisCache) -> Box<dyn Any> {
        Box::new(self.inner.compute(module, am))
    }
}

struct Entry {
    kind: AnalysisKind,
    dependencies: SmallVec<[AnalysisKind; 2]>,
    analysis: RefCell<Box<dyn ErasedAnalysis>>,
    // `None` means the analysis is invalid
    result: RefCell<Option<Box<dyn Any>>>,
    computations: Cell<usize>,
}

/// A lazy store of analysis results for a single module.
///
/// Analyses are registered through [`Self::register`] and can then be requested
/// through [`Self::get`], which either returns the cached result or (if the
/// analysis is invalid) computes the result, caches it and returns it.
///
/// After a transform pass runs, the analyses that it declared in its
/// [`Invalidation`] are dropped through [`Self::invalidate`]. Nothing is
/// recomputed eagerly.
#[derive(Default)]
pub struct AnalysisCache {
    entries: Vec<Entry>,
    lookup: SaHashMap<AnalysisKind, usize>,
}

impl AnalysisCache {
    /// Creates a cache with no analyses registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an analysis with the cache. It is not computed until
    /// something requests it.
    ///
    /// Every kind of analysis can only be registered once.
    pub fn register<T: Analysis>(&mut self, analysis: T) -> Result<()> {
        let kind = AnalysisKind::of::<T>();

        if self.lookup.contains_key(&kind) {
            return Err(PipelineError::Configuration(format!(
                "analysis `{kind}` was registered twice"
            )));
        }

        self.lookup.insert(kind, self.entries.len());
        self.entries.push(Entry {
            kind,
            dependencies: analysis.dependencies(),
            analysis: RefCell::new(Box::new(AnalysisWrapper { inner: analysis })),
            result: RefCell::new(None),
            computations: Cell::new(0),
        });

        Ok(())
    }

    /// Lazily gets the result of an analysis. If the analysis has been invalidated,
    /// the result is re-computed, cached, and then returned.
    ///
    /// # Panics
    /// Panics if `T` was never registered.
    pub fn get<T: Analysis>(&self, module: &Module) -> Ref<'_, T::Result> {
        match self.try_get::<T>(module) {
            Some(result) => result,
            None => panic!(
                "trying to get analysis `{}` that hasn't been registered",
                AnalysisKind::of::<T>()
            ),
        }
    }

    /// Equivalent to [`Self::get`], except that an unregistered analysis
    /// returns `None` instead of panicking.
    pub fn try_get<T: Analysis>(&self, module: &Module) -> Option<Ref<'_, T::Result>> {
        let entry = &self.entries[*self.lookup.get(&AnalysisKind::of::<T>())?];

        if entry.result.borrow().is_none() {
            // the borrow of `analysis` has to end before the result is stored,
            // the computation may request other analyses through `self`
            let result = entry.analysis.borrow_mut().compute(module, self);

            log::trace!("computed analysis `{}`", entry.kind);

            entry.computations.set(entry.computations.get() + 1);
            entry.result.replace(Some(result));
        }

        Some(Ref::map(entry.result.borrow(), |inner| {
            // we just made sure the analysis is valid, and the kind
            // lookup guarantees that the box holds a `T::Result`
            inner
                .as_ref()
                .and_then(|result| result.downcast_ref())
                .expect("analysis result should be valid and of the right type")
        }))
    }

    /// Invalidates every analysis named by `invalidation`, along with every
    /// analysis that (transitively) depends on one of them.
    ///
    /// Nothing is recomputed. Invalidating an analysis that is already
    /// invalid does nothing.
    pub fn invalidate(&mut self, invalidation: &Invalidation) {
        if invalidation.is_nothing() {
            return;
        }

        let mut stale: SmallVec<[bool; 8]> = self
            .entries
            .iter()
            .map(|entry| invalidation.invalidates(entry.kind))
            .collect();

        // propagate through dependencies until nothing else becomes stale.
        // the number of analyses is tiny, so the quadratic walk is fine
        let mut changed = true;

        while changed {
            changed = false;

            for (i, entry) in self.entries.iter().enumerate() {
                if stale[i] {
                    continue;
                }

                let depends_on_stale = entry
                    .dependencies
                    .iter()
                    .any(|dep| self.lookup.get(dep).map_or(false, |&j| stale[j]));

                if depends_on_stale {
                    stale[i] = true;
                    changed = true;
                }
            }
        }

        for (entry, stale) in self.entries.iter_mut().zip(stale) {
            if stale && entry.result.get_mut().take().is_some() {
                log::trace!("invalidated analysis `{}`", entry.kind);
            }
        }
    }

    /// Checks if an analysis of kind `kind` has been registered.
    pub fn is_registered(&self, kind: AnalysisKind) -> bool {
        self.lookup.contains_key(&kind)
    }

    /// Checks if the analysis of kind `kind` currently has a valid cached result.
    pub fn is_valid(&self, kind: AnalysisKind) -> bool {
        self.lookup
            .get(&kind)
            .map_or(false, |&i| self.entries[i].result.borrow().is_some())
    }

    /// Gets the number of times that the analysis of kind `kind` has been computed.
    pub fn computations(&self, kind: AnalysisKind) -> usize {
        self.lookup
            .get(&kind)
            .map_or(0, |&i| self.entries[i].computations.get())
    }

    /// Gets every registered kind, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = AnalysisKind> + '_ {
        self.entries.iter().map(|entry| entry.kind)
    }

    /// The number of registered analyses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if no analyses are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for AnalysisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();

        for entry in self.entries.iter() {
            m.entry(&entry.kind.name(), &entry.result.borrow().is_some());
        }

        m.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    struct FunctionCount;

    impl Analysis for FunctionCount {
        type Result = usize;

        fn compute(&mut self, module: &Module, _: &AnalysisCache) -> usize {
            module.function_count()
        }
    }

    struct DoubledCount;

    impl Analysis for DoubledCount {
        type Result = usize;

        fn dependencies(&self) -> SmallVec<[AnalysisKind; 2]> {
            smallvec![AnalysisKind::of::<FunctionCount>()]
        }

        fn compute(&mut self, module: &Module, am: &AnalysisCache) -> usize {
            *am.get::<FunctionCount>(module) * 2
        }
    }

    struct Unrelated;

    impl Analysis for Unrelated {
        type Result = &'static str;

        fn compute(&mut self, _: &Module, _: &AnalysisCache) -> &'static str {
            "unrelated"
        }
    }

    fn cache() -> AnalysisCache {
        let mut am = AnalysisCache::new();

        am.register(FunctionCount).unwrap();
        am.register(DoubledCount).unwrap();
        am.register(Unrelated).unwrap();

        am
    }

    #[test]
    fn lazy_and_cached() {
        let am = cache();
        let module = Module::new("test");
        let kind = AnalysisKind::of::<FunctionCount>();

        assert!(!am.is_valid(kind));
        assert_eq!(am.computations(kind), 0);
        assert_eq!(*am.get::<FunctionCount>(&module), 0);
        assert_eq!(*am.get::<FunctionCount>(&module), 0);
        assert_eq!(am.computations(kind), 1);
        assert!(am.is_valid(kind));
    }

    #[test]
    fn recomputes_once_after_invalidation() {
        let mut am = cache();
        let module = Module::new("test");
        let kind = AnalysisKind::of::<FunctionCount>();

        let _ = am.get::<FunctionCount>(&module);
        am.invalidate(&Invalidation::only::<FunctionCount>());
        am.invalidate(&Invalidation::only::<FunctionCount>());
        assert!(!am.is_valid(kind));

        let _ = am.get::<FunctionCount>(&module);
        let _ = am.get::<FunctionCount>(&module);
        assert_eq!(am.computations(kind), 2);
    }

    #[test]
    fn dependents_are_invalidated() {
        let mut am = cache();
        let module = Module::new("test");

        assert_eq!(*am.get::<DoubledCount>(&module), 0);
        let _ = am.get::<Unrelated>(&module);

        am.invalidate(&Invalidation::only::<FunctionCount>());

        assert!(!am.is_valid(AnalysisKind::of::<FunctionCount>()));
        assert!(!am.is_valid(AnalysisKind::of::<DoubledCount>()));
        assert!(am.is_valid(AnalysisKind::of::<Unrelated>()));

        am.invalidate(&Invalidation::Nothing);
        assert!(am.is_valid(AnalysisKind::of::<Unrelated>()));

        am.invalidate(&Invalidation::All);
        assert!(!am.is_valid(AnalysisKind::of::<Unrelated>()));
    }

    #[test]
    fn duplicate_registration() {
        let mut am = cache();

        assert!(matches!(
            am.register(FunctionCount),
            Err(PipelineError::Configuration(_))
        ));
        assert_eq!(am.len(), 3);
    }

    #[test]
    fn unregistered() {
        let am = AnalysisCache::new();
        let module = Module::new("test");

        assert!(am.try_get::<FunctionCount>(&module).is_none());
        assert!(!am.is_registered(AnalysisKind::of::<FunctionCount>()));
    }

    #[test]
    #[should_panic]
    fn unregistered_get_panics() {
        let am = AnalysisCache::new();
        let module = Module::new("test");

        let _ = am.get::<FunctionCount>(&module);
    }

    #[test]
    fn kind_names() {
        assert_eq!(AnalysisKind::of::<FunctionCount>().name(), "FunctionCount");
        assert_eq!(AnalysisKind::of::<Unrelated>().to_string(), "Unrelated");
    }
}
