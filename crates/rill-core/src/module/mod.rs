use crate::ast::Program;
use std::collections::HashMap;
use std::rc::Rc;

pub mod resolver;

pub use resolver::*;

/// Supplies parsed modules by name. Lookups are pure; the provider is
/// populated before resolution starts.
pub trait ModuleProvider {
    fn module(&self, name: &str) -> Option<Rc<Program>>;
}

/// In-memory provider.
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    modules: HashMap<String, Rc<Program>>,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, program: Program) {
        self.modules.insert(name.into(), Rc::new(program));
    }

    pub fn with_module(mut self, name: impl Into<String>, program: Program) -> Self {
        self.insert(name, program);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleProvider for ModuleMap {
    fn module(&self, name: &str) -> Option<Rc<Program>> {
        self.modules.get(name).cloned()
    }
}
