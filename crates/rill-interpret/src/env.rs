use crate::value::Value;
use std::rc::Rc;

/// Index of a module in the interpreter's module table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub usize);

#[derive(Debug)]
struct Frame {
    bindings: Vec<(String, Value)>,
    parent: Env,
}

/// Lexical scope chain. Frames are immutable once pushed; extending an
/// environment returns a new head and leaves the receiver untouched, so
/// closures and suspended tasks can hold on to any prefix of the chain.
#[derive(Debug, Clone, Default)]
pub struct Env(Option<Rc<Frame>>);

impl Env {
    pub fn empty() -> Self {
        Env(None)
    }

    /// Pushes a frame holding `bindings`. Later entries shadow earlier
    /// ones.
    pub fn extend(&self, bindings: Vec<(String, Value)>) -> Env {
        if bindings.is_empty() {
            return self.clone();
        }
        Env(Some(Rc::new(Frame {
            bindings,
            parent: self.clone(),
        })))
    }

    pub fn bind(&self, name: impl Into<String>, value: Value) -> Env {
        self.extend(vec![(name.into(), value)])
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut current = self.0.as_ref();
        while let Some(frame) = current {
            if let Some((_, value)) = frame.bindings.iter().rev().find(|(n, _)| n == name) {
                return Some(value);
            }
            current = frame.parent.0.as_ref();
        }
        None
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.0.as_ref();
        while let Some(frame) = current {
            depth += 1;
            current = frame.parent.0.as_ref();
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extending_never_changes_the_parent() {
        let outer = Env::empty().bind("x", Value::Int(1));
        let inner = outer.bind("x", Value::Int(2));
        assert_eq!(outer.lookup("x"), Some(&Value::Int(1)));
        assert_eq!(inner.lookup("x"), Some(&Value::Int(2)));
        assert_eq!(inner.depth(), 2);
        assert_eq!(inner.lookup("y"), None);
    }
}
