use crate::typing::env::Binding;
use crate::TypeChecker;
use rill_core::ast::{Literal, Pattern, PatternKind};
use rill_core::types::Ty;
use std::collections::HashSet;

fn literal_type(literal: &Literal) -> Ty {
    match literal {
        Literal::Int(_) => Ty::Int,
        Literal::Float(_) => Ty::Float,
        Literal::String(_) => Ty::String,
        Literal::Bool(_) => Ty::Bool,
        Literal::Void => Ty::Void,
    }
}

impl TypeChecker {
    /// Checks `pattern` against a value of type `ty` and declares its
    /// bindings in the current scope.
    pub(crate) fn bind_pattern(&mut self, pattern: &Pattern, ty: &Ty, seen: &mut HashSet<String>) {
        let span = pattern.span;
        let ty = ty.base().clone();
        match &pattern.kind {
            PatternKind::Wildcard => {}
            PatternKind::Bind(name) => self.declare_binding(name, ty, pattern, seen),
            PatternKind::Literal(literal) => {
                let lit = literal_type(literal);
                if !lit.accepts(&ty) && !ty.accepts(&lit) {
                    self.error(
                        format!("pattern of type {lit} cannot match a value of type {ty}"),
                        span,
                    );
                }
            }
            PatternKind::Some(inner) => {
                let inner_ty = match ty {
                    Ty::Option(inner) => *inner,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.error(
                            format!("`Some` pattern cannot match a value of type {other}"),
                            span,
                        );
                        Ty::Unknown
                    }
                };
                self.bind_pattern(inner, &inner_ty, seen);
            }
            PatternKind::None => {
                if !matches!(ty, Ty::Option(_) | Ty::Unknown) {
                    self.error(format!("`None` pattern cannot match a value of type {ty}"), span);
                }
            }
            PatternKind::Ok(inner) | PatternKind::Err(inner) => {
                let is_ok = matches!(pattern.kind, PatternKind::Ok(_));
                let inner_ty = match ty {
                    Ty::Result(ok, _) if is_ok => *ok,
                    Ty::Result(_, err) => *err,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        let tag = if is_ok { "Ok" } else { "Err" };
                        self.error(
                            format!("`{tag}` pattern cannot match a value of type {other}"),
                            span,
                        );
                        Ty::Unknown
                    }
                };
                self.bind_pattern(inner, &inner_ty, seen);
            }
            PatternKind::Resolved(inner) | PatternKind::Failed(inner) => {
                let inner_ty = match ty {
                    Ty::Future(value) if matches!(pattern.kind, PatternKind::Resolved(_)) => *value,
                    Ty::Future(_) | Ty::Unknown => Ty::Unknown,
                    other => {
                        self.error(
                            format!("future pattern cannot match a value of type {other}"),
                            span,
                        );
                        Ty::Unknown
                    }
                };
                self.bind_pattern(inner, &inner_ty, seen);
            }
            PatternKind::Pending => {
                if !matches!(ty, Ty::Future(_) | Ty::Unknown) {
                    self.error(format!("future pattern cannot match a value of type {ty}"), span);
                }
            }
            PatternKind::Record { name, fields, .. } => {
                let Some(schema) = self.schemas.record(name).cloned() else {
                    self.error(format!("unknown record '{name}'"), span);
                    return;
                };
                if !Ty::Record(name.clone()).accepts(&ty) {
                    self.error(
                        format!("record pattern '{name}' cannot match a value of type {ty}"),
                        span,
                    );
                }
                for field in fields {
                    let Some(field_ty) = schema.field(&field.name).cloned() else {
                        self.error(
                            format!("record '{name}' has no field '{}'", field.name),
                            field.span,
                        );
                        continue;
                    };
                    match &field.pattern {
                        Some(sub) => self.bind_pattern(sub, &field_ty, seen),
                        None => self.declare_binding(&field.name, field_ty, pattern, seen),
                    }
                }
            }
            PatternKind::Variant {
                enum_name,
                variant,
                payload,
            } => {
                let Some(schema) = self.schemas.enumeration(enum_name).cloned() else {
                    self.error(format!("unknown enum '{enum_name}'"), span);
                    return;
                };
                if !Ty::Enum(enum_name.clone()).accepts(&ty) {
                    let path = format!("{enum_name}::{variant}");
                    self.error(
                        format!("variant pattern '{path}' cannot match a value of type {ty}"),
                        span,
                    );
                }
                let Some(declared) = schema.variant(variant).cloned() else {
                    self.error(format!("enum '{enum_name}' has no variant '{variant}'"), span);
                    return;
                };
                match (payload, declared) {
                    (Some(sub), Some(payload_ty)) => self.bind_pattern(sub, &payload_ty, seen),
                    (Some(_), None) => self.error(
                        format!("variant '{enum_name}::{variant}' carries no payload"),
                        span,
                    ),
                    (None, _) => {}
                }
            }
            PatternKind::Tuple(items) => match ty {
                Ty::Tuple(types) if types.len() != items.len() => {
                    self.error(
                        format!(
                            "tuple pattern has {} element(s) but the value has {}",
                            items.len(),
                            types.len()
                        ),
                        span,
                    );
                }
                Ty::Tuple(types) => {
                    for (item, item_ty) in items.iter().zip(types.iter()) {
                        self.bind_pattern(item, item_ty, seen);
                    }
                }
                Ty::Unknown => {
                    for item in items {
                        self.bind_pattern(item, &Ty::Unknown, seen);
                    }
                }
                other => self.error(
                    format!("tuple pattern cannot match a value of type {other}"),
                    span,
                ),
            },
            PatternKind::List { items, rest } => {
                let elem = match ty {
                    Ty::List(elem) => *elem,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.error(
                            format!("list pattern cannot match a value of type {other}"),
                            span,
                        );
                        return;
                    }
                };
                for item in items {
                    self.bind_pattern(item, &elem, seen);
                }
                if let Some(rest) = rest {
                    self.bind_pattern(rest, &Ty::list(elem), seen);
                }
            }
            PatternKind::Map(entries) => {
                let value_ty = match ty {
                    Ty::Map(_, value) => *value,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.error(
                            format!("map pattern cannot match a value of type {other}"),
                            span,
                        );
                        return;
                    }
                };
                for (_, entry) in entries {
                    self.bind_pattern(entry, &value_ty, seen);
                }
            }
        }
    }

    fn declare_binding(
        &mut self,
        name: &str,
        ty: Ty,
        pattern: &Pattern,
        seen: &mut HashSet<String>,
    ) {
        if !seen.insert(name.to_string()) {
            self.error(format!("'{name}' is bound more than once in this pattern"), pattern.span);
            return;
        }
        if !self.env.declare(name, Binding::of(ty)) {
            self.error(format!("'{name}' is already defined in this scope"), pattern.span);
        }
    }
}
