use crate::typing::refine::ConstValue;
use rill_core::types::Ty;
use std::collections::HashMap;

/// Static facts known about one binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: Ty,
    /// Compile-time value, when the initializer folds to a constant.
    pub constant: Option<ConstValue>,
    /// Bound to a stream rooted at `generate_infinite` with no `take`.
    pub unbounded: bool,
}

impl Binding {
    pub fn of(ty: Ty) -> Self {
        Self {
            ty,
            constant: None,
            unbounded: false,
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, Binding>,
}

/// Lexical scopes of the checker; index 0 holds module-level bindings.
#[derive(Debug, Default)]
pub struct TypeEnv {
    scopes: Vec<Scope>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declares `name` in the innermost scope. Returns false when the scope
    /// already has a binding of that name.
    pub fn declare(&mut self, name: &str, binding: Binding) -> bool {
        let Some(scope) = self.scopes.last_mut() else {
            return false;
        };
        if scope.names.contains_key(name) {
            return false;
        }
        scope.names.insert(name.to_string(), binding);
        true
    }

    /// Overwrites a module-level binding, used once a hoisted signature is
    /// refined by checking its body.
    pub fn refine_global(&mut self, name: &str, binding: Binding) {
        if let Some(scope) = self.scopes.first_mut() {
            scope.names.insert(name.to_string(), binding);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.names.get(name))
    }

    pub fn is_global(&self, name: &str) -> bool {
        let local = self
            .scopes
            .iter()
            .skip(1)
            .any(|scope| scope.names.contains_key(name));
        !local && self.scopes.first().is_some_and(|s| s.names.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_is_allowed_only_in_nested_scopes() {
        let mut env = TypeEnv::new();
        assert!(env.declare("x", Binding::of(Ty::Int)));
        assert!(!env.declare("x", Binding::of(Ty::String)));
        env.enter_scope();
        assert!(env.declare("x", Binding::of(Ty::String)));
        assert_eq!(env.lookup("x").map(|b| &b.ty), Some(&Ty::String));
        env.exit_scope();
        assert_eq!(env.lookup("x").map(|b| &b.ty), Some(&Ty::Int));
    }
}
