use crate::span::Span;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Type annotation as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named {
        name: String,
        args: Vec<TypeExpr>,
        span: Span,
    },
    Tuple(Vec<TypeExpr>, Span),
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn named(name: impl Into<String>, span: Span) -> Self {
        TypeExpr::Named {
            name: name.into(),
            args: Vec::new(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named { span, .. }
            | TypeExpr::Tuple(_, span)
            | TypeExpr::Function { span, .. } => *span,
        }
    }
}

impl Display for TypeExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExpr::Named { name, args, .. } if args.is_empty() => f.write_str(name),
            TypeExpr::Named { name, args, .. } => write!(f, "{name}<{}>", args.iter().join(", ")),
            TypeExpr::Tuple(items, _) => write!(f, "({})", items.iter().join(", ")),
            TypeExpr::Function { params, ret, .. } => {
                write!(f, "fn({}) -> {ret}", params.iter().join(", "))
            }
        }
    }
}
