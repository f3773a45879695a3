//! Structural pattern matching shared by `match`, `let` destructuring and
//! parameter binding.

use crate::scheduler::{FutureState, FutureTable};
use crate::value::Value;
use rill_core::ast::{Literal, Pattern, PatternKind};

pub type BindingSet = Vec<(String, Value)>;

/// Decides whether `value` fits `pattern` and collects the bindings it
/// introduces. Future markers consult `futures` for the current state.
pub fn match_pattern(
    pattern: &Pattern,
    value: &Value,
    futures: &FutureTable,
) -> Option<BindingSet> {
    let mut bindings = Vec::new();
    Matcher { futures }
        .visit(pattern, value, &mut bindings)
        .then_some(bindings)
}

fn literal_matches(literal: &Literal, value: &Value) -> bool {
    match (literal, value) {
        (Literal::Int(a), _) => *value == Value::Int(*a),
        (Literal::Float(a), _) => *value == Value::Float(*a),
        (Literal::String(a), Value::String(b)) => a == b,
        (Literal::Bool(a), Value::Bool(b)) => a == b,
        (Literal::Void, Value::Void) => true,
        _ => false,
    }
}

struct Matcher<'a> {
    futures: &'a FutureTable,
}

impl Matcher<'_> {
    fn visit(&self, pattern: &Pattern, value: &Value, out: &mut BindingSet) -> bool {
        match (&pattern.kind, value) {
            (PatternKind::Wildcard, _) => true,
            (PatternKind::Bind(name), _) => {
                out.push((name.clone(), value.clone()));
                true
            }
            (PatternKind::Literal(literal), _) => literal_matches(literal, value),
            (PatternKind::Some(inner), Value::Option(Some(v))) => self.visit(inner, v, out),
            (PatternKind::None, Value::Option(None)) => true,
            (PatternKind::Ok(inner), Value::Result(Ok(v))) => self.visit(inner, v, out),
            (PatternKind::Err(inner), Value::Result(Err(e))) => self.visit(inner, e, out),
            (PatternKind::Resolved(inner), Value::Future(id)) => match self.futures.state(*id) {
                Some(FutureState::Resolved(v)) => self.visit(inner, v, out),
                _ => false,
            },
            (PatternKind::Failed(inner), Value::Future(id)) => match self.futures.state(*id) {
                Some(FutureState::Failed(failure)) => self.visit(inner, &failure.error, out),
                _ => false,
            },
            (PatternKind::Pending, Value::Future(id)) => {
                matches!(self.futures.state(*id), Some(FutureState::Pending))
            }
            (PatternKind::Record { name, fields, .. }, Value::Record(record)) => {
                if &record.name != name {
                    return false;
                }
                fields.iter().all(|field| match record.field(&field.name) {
                    Some(v) => match &field.pattern {
                        Some(sub) => self.visit(sub, v, out),
                        None => {
                            out.push((field.name.clone(), v.clone()));
                            true
                        }
                    },
                    None => false,
                })
            }
            (
                PatternKind::Variant {
                    enum_name,
                    variant,
                    payload,
                },
                Value::Enum(value),
            ) => {
                if &value.enum_name != enum_name || &value.variant != variant {
                    return false;
                }
                match (payload, &value.payload) {
                    (Some(sub), Some(v)) => self.visit(sub, v, out),
                    (Some(_), None) => false,
                    (None, _) => true,
                }
            }
            (PatternKind::Tuple(items), Value::Tuple(values)) => {
                items.len() == values.len()
                    && items.iter().zip(values.iter()).all(|(p, v)| self.visit(p, v, out))
            }
            (PatternKind::List { items, rest }, Value::List(values)) => {
                let fits = match rest {
                    Some(_) => values.len() >= items.len(),
                    None => values.len() == items.len(),
                };
                if !fits || !items.iter().zip(values.iter()).all(|(p, v)| self.visit(p, v, out)) {
                    return false;
                }
                match rest {
                    Some(rest) => {
                        let tail = Value::list(values[items.len()..].to_vec());
                        self.visit(rest, &tail, out)
                    }
                    None => true,
                }
            }
            (PatternKind::Map(entries), Value::Map(map)) => entries.iter().all(|(key, sub)| {
                map.get(key).is_some_and(|v| self.visit(sub, v, out))
            }),
            (PatternKind::Map(entries), Value::Record(record)) => entries
                .iter()
                .all(|(key, sub)| record.field(key).is_some_and(|v| self.visit(sub, v, out))),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::span::Span;

    fn pat(kind: PatternKind) -> Pattern {
        Pattern::new(kind, Span::null())
    }

    fn bind(name: &str) -> Pattern {
        pat(PatternKind::Bind(name.into()))
    }

    #[test]
    fn list_rest_binds_the_remaining_suffix() {
        let pattern = pat(PatternKind::List {
            items: vec![bind("head")],
            rest: Some(Box::new(bind("tail"))),
        });
        let value = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let bindings = match_pattern(&pattern, &value, &FutureTable::default()).expect("matches");
        assert_eq!(
            bindings,
            vec![
                ("head".to_string(), Value::Int(1)),
                ("tail".to_string(), Value::list(vec![Value::Int(2), Value::Int(3)])),
            ]
        );
        let empty = Value::list(Vec::new());
        assert!(match_pattern(&pattern, &empty, &FutureTable::default()).is_none());
    }

    #[test]
    fn tuple_arity_must_agree() {
        let pattern = pat(PatternKind::Tuple(vec![bind("a"), bind("b")]));
        let triple = Value::tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(match_pattern(&pattern, &triple, &FutureTable::default()).is_none());
    }
}
