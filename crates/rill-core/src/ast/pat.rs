use crate::ast::Literal;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldPattern {
    pub name: String,
    /// `None` for the shorthand `{ x }`, which binds the field to `x`.
    pub pattern: Option<Pattern>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Wildcard,
    Bind(String),
    Literal(Literal),
    Some(Box<Pattern>),
    None,
    Ok(Box<Pattern>),
    Err(Box<Pattern>),
    /// Future markers: `Resolved(p)`, `Failed(p)`, `Pending`.
    Resolved(Box<Pattern>),
    Failed(Box<Pattern>),
    Pending,
    Record {
        name: String,
        fields: Vec<FieldPattern>,
        rest: bool,
    },
    Variant {
        enum_name: String,
        variant: String,
        payload: Option<Box<Pattern>>,
    },
    Tuple(Vec<Pattern>),
    /// `[a, b]` or `[head, ...tail]`
    List {
        items: Vec<Pattern>,
        rest: Option<Box<Pattern>>,
    },
    /// Partial key set; unmatched keys are ignored.
    Map(Vec<(String, Pattern)>),
}

impl Pattern {
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.kind, PatternKind::Wildcard)
    }

    /// Names bound by this pattern, in source order.
    pub fn bindings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            PatternKind::Wildcard
            | PatternKind::Literal(_)
            | PatternKind::None
            | PatternKind::Pending => {}
            PatternKind::Bind(name) => out.push(name),
            PatternKind::Some(inner)
            | PatternKind::Ok(inner)
            | PatternKind::Err(inner)
            | PatternKind::Resolved(inner)
            | PatternKind::Failed(inner) => inner.collect_bindings(out),
            PatternKind::Record { fields, .. } => {
                for field in fields {
                    match &field.pattern {
                        Some(pattern) => pattern.collect_bindings(out),
                        None => out.push(&field.name),
                    }
                }
            }
            PatternKind::Variant { payload, .. } => {
                if let Some(payload) = payload {
                    payload.collect_bindings(out);
                }
            }
            PatternKind::Tuple(items) => items.iter().for_each(|p| p.collect_bindings(out)),
            PatternKind::List { items, rest } => {
                items.iter().for_each(|p| p.collect_bindings(out));
                if let Some(rest) = rest {
                    rest.collect_bindings(out);
                }
            }
            PatternKind::Map(entries) => entries.iter().for_each(|(_, p)| p.collect_bindings(out)),
        }
    }
}
