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
use crate::utility::SaHashMap;
use std::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// How far along the pipeline a module is.
///
/// A module only ever moves forward, from [`Stage::Raw`] to [`Stage::Canonical`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Stage {
    /// Freshly produced by a frontend, diagnostics have not been run yet.
    Raw,
    /// The diagnostic passes have run over the module.
    Canonical,
}

/// A class with a method table, used to resolve virtual calls.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Class {
    name: String,
    is_final: bool,
    methods: SaHashMap<String, String>,
}

impl Class {
    /// Creates a class with an empty method table. A `final` class cannot
    /// be subclassed, so its method table is the only possible one.
    pub fn new(name: &str, is_final: bool) -> Self {
        Self {
            name: name.to_owned(),
            is_final,
            methods: SaHashMap::default(),
        }
    }

    /// Adds `method` to the method table, implemented by the function `implementation`.
    pub fn with_method(mut self, method: &str, implementation: &str) -> Self {
        self.methods
            .insert(method.to_owned(), implementation.to_owned());

        self
    }

    /// Gets the name of the class.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether the class can have subclasses.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Gets the function implementing `method`, if the class has one.
    pub fn implementation(&self, method: &str) -> Option<&str> {
        self.methods.get(method).map(String::as_str)
    }

    /// Gets every function referred to by the method table.
    pub fn implementations(&self) -> impl Iterator<Item = &str> {
        self.methods.values().map(String::as_str)
    }
}

/// Holds definitions for functions that are declared in a module but defined
/// elsewhere (e.g. in a library), so they can be linked in on demand.
///
/// Once the module no longer needs to pull in definitions the loader is dropped
/// through [`Module::invalidate_loader`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DefinitionLoader {
    definitions: SaHashMap<String, Function>,
}

impl DefinitionLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a definition available to be loaded.
    pub fn with_definition(mut self, function: Function) -> Self {
        self.definitions
            .insert(function.name().to_owned(), function);

        self
    }

    /// Looks up a definition by name.
    pub fn lookup(&self, name: &str) -> Option<&Function> {
        self.definitions.get(name)
    }

    /// The number of definitions the loader knows about.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Checks if the loader has no definitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Contains everything in a single unit of compilation.
///
/// Functions are stored in the order they were added and are addressed by name.
/// The module also carries the diagnostics reported against it so far, these
/// only ever grow.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Module {
    name: String,
    stage: Stage,
    functions: Vec<Function>,
    names: SaHashMap<String, usize>,
    classes: SaHashMap<String, Class>,
    loader: Option<DefinitionLoader>,
    diagnostics: Diagnostics,
}

impl Module {
    /// Creates a new, empty module at [`Stage::Raw`].
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            stage: Stage::Raw,
            functions: Vec::default(),
            names: SaHashMap::default(),
            classes: SaHashMap::default(),
            loader: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Gets the name of the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the current stage of the module.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves the module to `stage`.
    ///
    /// # Panics
    /// Stages never regress, trying to move a canonical module back
    /// to [`Stage::Raw`] panics.
    pub fn set_stage(&mut self, stage: Stage) {
        assert!(
            stage >= self.stage,
            "module `{}` cannot move from {:?} back to {:?}",
            self.name,
            self.stage,
            stage
        );

        self.stage = stage;
    }

    /// Adds a function to the module. If a function with the same name already
    /// exists it is replaced in-place, otherwise the function is appended.
    pub fn insert_function(&mut self, function: Function) {
        match self.names.get(function.name()) {
            Some(&index) => self.functions[index] = function,
            None => {
                self.names
                    .insert(function.name().to_owned(), self.functions.len());
                self.functions.push(function);
            }
        }
    }

    /// Finds a function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.names.get(name).map(|&index| &self.functions[index])
    }

    /// Finds a function by name.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        match self.names.get(name) {
            Some(&index) => Some(&mut self.functions[index]),
            None => None,
        }
    }

    /// Returns an iterator over every function in the module.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Returns an iterator over every function in the module.
    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut()
    }

    /// Gets the names of every function in the module, in order. This is
    /// useful for passes that need to mutate the module while walking it.
    pub fn function_names(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.name().to_owned()).collect()
    }

    /// The number of functions in the module.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Removes every function that `keep` returns `false` for. Returns
    /// the number of functions that were removed.
    pub fn retain_functions(&mut self, mut keep: impl FnMut(&Function) -> bool) -> usize {
        let before = self.functions.len();

        self.functions.retain(|f| keep(f));
        self.reindex();

        before - self.functions.len()
    }

    /// Adds a class to the module, replacing any class with the same name.
    pub fn insert_class(&mut self, class: Class) {
        self.classes.insert(class.name().to_owned(), class);
    }

    /// Finds a class by name.
    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.get(name)
    }

    /// Returns an iterator over every class in the module, in no particular order.
    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.values()
    }

    /// Gets the definition loader, if the module still has one.
    pub fn loader(&self) -> Option<&DefinitionLoader> {
        self.loader.as_ref()
    }

    /// Gives the module a definition loader to link definitions from.
    pub fn set_loader(&mut self, loader: DefinitionLoader) {
        self.loader = Some(loader);
    }

    /// Drops the definition loader. Returns whether there was one to drop.
    pub fn invalidate_loader(&mut self) -> bool {
        self.loader.take().is_some()
    }

    /// Gets every diagnostic that has been recorded against the module.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Records diagnostics against the module. Recorded diagnostics are never removed.
    pub fn record_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.diagnostics.merge(diagnostics);
    }

    /// Checks if an error has ever been recorded against the module.
    pub fn had_error(&self) -> bool {
        self.diagnostics.had_error()
    }

    /// Counts the instructions in every function body in the module.
    pub fn inst_count(&self) -> usize {
        self.functions
            .iter()
            .filter_map(Function::definition)
            .map(|def| def.len())
            .sum()
    }

    fn reindex(&mut self) {
        self.names.clear();

        for (index, function) in self.functions.iter().enumerate() {
            self.names.insert(function.name().to_owned(), index);
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {} ({:?})", self.name, self.stage)?;

        for function in self.functions.iter() {
            writeln!(f)?;
            write!(f, "{function}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::ir::{Definition, FunctionAttrs, Linkage};

    fn function(name: &str) -> Function {
        Function::new(
            name,
            Linkage::Private,
            FunctionAttrs::default(),
            Definition::new(0),
        )
    }

    #[test]
    fn insert_and_remove() {
        let mut module = Module::new("test");

        module.insert_function(function("a"));
        module.insert_function(function("b"));
        module.insert_function(function("c"));

        assert_eq!(module.function_names(), ["a", "b", "c"]);
        assert_eq!(module.retain_functions(|f| f.name() != "b"), 1);
        assert_eq!(module.function_names(), ["a", "c"]);
        assert!(module.function("c").is_some());
        assert!(module.function("b").is_none());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut module = Module::new("test");

        module.insert_function(Function::declaration("a", FunctionAttrs::default()));
        module.insert_function(function("b"));
        module.insert_function(function("a"));

        assert_eq!(module.function_names(), ["a", "b"]);
        assert!(!module.function("a").unwrap().is_declaration());
    }

    #[test]
    fn stage_advances() {
        let mut module = Module::new("test");

        assert_eq!(module.stage(), Stage::Raw);
        module.set_stage(Stage::Canonical);
        module.set_stage(Stage::Canonical);
        assert_eq!(module.stage(), Stage::Canonical);
    }

    #[test]
    #[should_panic]
    fn stage_never_regresses() {
        let mut module = Module::new("test");

        module.set_stage(Stage::Canonical);
        module.set_stage(Stage::Raw);
    }

    #[test]
    fn errors_are_sticky() {
        let mut module = Module::new("test");
        let mut diagnostics = Diagnostics::new();

        diagnostics.error("main", "something went wrong");
        module.record_diagnostics(diagnostics);
        module.record_diagnostics(Diagnostics::new());

        assert!(module.had_error());
        assert_eq!(module.diagnostics().len(), 1);
    }

    #[test]
    fn loader() {
        let mut module = Module::new("test");

        module.set_loader(DefinitionLoader::new().with_definition(function("lib")));

        assert!(module.loader().unwrap().lookup("lib").is_some());
        assert!(module.invalidate_loader());
        assert!(!module.invalidate_loader());
    }
}
