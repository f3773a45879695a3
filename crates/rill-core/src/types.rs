use crate::ast::{PExpr, TypeExpr};
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Resolved type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Int,
    Float,
    String,
    Bool,
    Void,
    List(Box<Ty>),
    Map(Box<Ty>, Box<Ty>),
    Set(Box<Ty>),
    Option(Box<Ty>),
    Result(Box<Ty>, Box<Ty>),
    Stream(Box<Ty>),
    Future(Box<Ty>),
    Tuple(Vec<Ty>),
    Function { params: Vec<Ty>, ret: Box<Ty> },
    Record(String),
    Enum(String),
    /// Base type constrained by the predicate of alias `alias`.
    Refined { alias: String, base: Box<Ty> },
    Model,
    Prediction,
    Unknown,
}

impl Ty {
    pub fn list(elem: Ty) -> Ty {
        Ty::List(Box::new(elem))
    }

    pub fn option(inner: Ty) -> Ty {
        Ty::Option(Box::new(inner))
    }

    pub fn result(ok: Ty, err: Ty) -> Ty {
        Ty::Result(Box::new(ok), Box::new(err))
    }

    pub fn stream(elem: Ty) -> Ty {
        Ty::Stream(Box::new(elem))
    }

    pub fn future(inner: Ty) -> Ty {
        Ty::Future(Box::new(inner))
    }

    pub fn function(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Function {
            params,
            ret: Box::new(ret),
        }
    }

    /// Strips refinements.
    pub fn base(&self) -> &Ty {
        match self {
            Ty::Refined { base, .. } => base.base(),
            other => other,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.base(), Ty::Unknown)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.base(), Ty::Int | Ty::Float)
    }

    /// Whether a value of this type could take part in arithmetic.
    pub fn maybe_numeric(&self) -> bool {
        matches!(self.base(), Ty::Int | Ty::Float | Ty::Unknown)
    }

    /// Element type for anything that can be iterated as a sequence.
    pub fn element(&self) -> Option<Ty> {
        match self.base() {
            Ty::List(elem) | Ty::Stream(elem) | Ty::Set(elem) => Some((**elem).clone()),
            Ty::Unknown => Some(Ty::Unknown),
            _ => None,
        }
    }

    /// Both sides are compatible when neither constrains the other.
    pub fn accepts(&self, actual: &Ty) -> bool {
        match (self.base(), actual.base()) {
            (Ty::Unknown, _) | (_, Ty::Unknown) => true,
            (Ty::Float, Ty::Int) => true,
            (Ty::List(a), Ty::List(b))
            | (Ty::Set(a), Ty::Set(b))
            | (Ty::Option(a), Ty::Option(b))
            | (Ty::Stream(a), Ty::Stream(b))
            | (Ty::Future(a), Ty::Future(b)) => a.accepts(b),
            (Ty::Map(ka, va), Ty::Map(kb, vb)) | (Ty::Result(ka, va), Ty::Result(kb, vb)) => {
                ka.accepts(kb) && va.accepts(vb)
            }
            (Ty::Tuple(a), Ty::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.accepts(y))
            }
            (
                Ty::Function { params: pa, ret: ra },
                Ty::Function { params: pb, ret: rb },
            ) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(x, y)| y.accepts(x))
                    && ra.accepts(rb)
            }
            (a, b) => a == b,
        }
    }

    /// Least common type of two branches; falls back to `Unknown`.
    pub fn join(&self, other: &Ty) -> Ty {
        if self.accepts(other) && !self.is_unknown() {
            self.base().clone()
        } else if other.accepts(self) && !other.is_unknown() {
            other.base().clone()
        } else {
            Ty::Unknown
        }
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Int => f.write_str("Int"),
            Ty::Float => f.write_str("Float"),
            Ty::String => f.write_str("String"),
            Ty::Bool => f.write_str("Bool"),
            Ty::Void => f.write_str("Void"),
            Ty::List(t) => write!(f, "List<{t}>"),
            Ty::Map(k, v) => write!(f, "Map<{k}, {v}>"),
            Ty::Set(t) => write!(f, "Set<{t}>"),
            Ty::Option(t) => write!(f, "Option<{t}>"),
            Ty::Result(t, e) => write!(f, "Result<{t}, {e}>"),
            Ty::Stream(t) => write!(f, "Stream<{t}>"),
            Ty::Future(t) => write!(f, "Future<{t}>"),
            Ty::Tuple(items) => write!(f, "({})", items.iter().join(", ")),
            Ty::Function { params, ret } => write!(f, "fn({}) -> {ret}", params.iter().join(", ")),
            Ty::Record(name) | Ty::Enum(name) => f.write_str(name),
            Ty::Refined { alias, .. } => f.write_str(alias),
            Ty::Model => f.write_str("Model"),
            Ty::Prediction => f.write_str("Prediction"),
            Ty::Unknown => f.write_str("?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<(String, Ty)>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&Ty> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: String,
    /// Variant name and payload type; several payload types form a tuple.
    pub variants: Vec<(String, Option<Ty>)>,
}

impl EnumSchema {
    pub fn variant(&self, name: &str) -> Option<&Option<Ty>> {
        self.variants.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasSchema {
    pub name: String,
    pub base: Ty,
    /// Boolean expression over `value`.
    pub predicate: Option<PExpr>,
}

/// Declared shapes of every record, enum and alias in a program. Built
/// once by the checker and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    pub records: HashMap<String, RecordSchema>,
    pub enums: HashMap<String, EnumSchema>,
    pub aliases: HashMap<String, AliasSchema>,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str) -> Option<&RecordSchema> {
        self.records.get(name)
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumSchema> {
        self.enums.get(name)
    }

    pub fn alias(&self, name: &str) -> Option<&AliasSchema> {
        self.aliases.get(name)
    }

    pub fn is_type_name(&self, name: &str) -> bool {
        self.records.contains_key(name)
            || self.enums.contains_key(name)
            || self.aliases.contains_key(name)
    }

    /// Resolves a written annotation. Unknown names yield an error message.
    pub fn resolve(&self, ty: &TypeExpr) -> Result<Ty, String> {
        match ty {
            TypeExpr::Tuple(items, _) => Ok(Ty::Tuple(
                items.iter().map(|t| self.resolve(t)).collect::<Result<_, _>>()?,
            )),
            TypeExpr::Function { params, ret, .. } => Ok(Ty::function(
                params.iter().map(|t| self.resolve(t)).collect::<Result<_, _>>()?,
                self.resolve(ret)?,
            )),
            TypeExpr::Named { name, args, .. } => {
                let args = args
                    .iter()
                    .map(|t| self.resolve(t))
                    .collect::<Result<Vec<_>, _>>()?;
                self.resolve_named(name, args)
            }
        }
    }

    fn resolve_named(&self, name: &str, mut args: Vec<Ty>) -> Result<Ty, String> {
        let expected = match name {
            "List" | "Set" | "Option" | "Stream" | "Future" => 1,
            "Map" | "Result" => 2,
            _ => 0,
        };
        if args.len() != expected {
            if expected == 0 {
                return Err(format!("type '{name}' takes no type arguments"));
            }
            return Err(format!(
                "type '{name}' expects {expected} type argument(s), found {}",
                args.len()
            ));
        }
        let mut arg = || Box::new(args.remove(0));
        Ok(match name {
            "Int" => Ty::Int,
            "Float" | "Number" => Ty::Float,
            "String" => Ty::String,
            "Bool" => Ty::Bool,
            "Void" => Ty::Void,
            "Any" => Ty::Unknown,
            "Model" => Ty::Model,
            "Prediction" => Ty::Prediction,
            "List" => Ty::List(arg()),
            "Set" => Ty::Set(arg()),
            "Option" => Ty::Option(arg()),
            "Stream" => Ty::Stream(arg()),
            "Future" => Ty::Future(arg()),
            "Map" => {
                let key = arg();
                Ty::Map(key, arg())
            }
            "Result" => {
                let ok = arg();
                Ty::Result(ok, arg())
            }
            _ if self.records.contains_key(name) => Ty::Record(name.to_string()),
            _ if self.enums.contains_key(name) => Ty::Enum(name.to_string()),
            _ => match self.aliases.get(name) {
                Some(alias) if alias.predicate.is_some() => Ty::Refined {
                    alias: name.to_string(),
                    base: Box::new(alias.base.clone()),
                },
                Some(alias) => alias.base.clone(),
                None => return Err(format!("unknown type '{name}'")),
            },
        })
    }

    /// Every refinement alias a value of type `ty` must satisfy, outermost
    /// first.
    pub fn refinements<'a>(&'a self, ty: &Ty) -> Vec<&'a AliasSchema> {
        let mut out = Vec::new();
        let mut current = ty;
        while let Ty::Refined { alias, base } = current {
            if let Some(schema) = self.aliases.get(alias) {
                out.push(schema);
            }
            current = base;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn float_accepts_int_but_not_the_reverse() {
        assert!(Ty::Float.accepts(&Ty::Int));
        assert!(!Ty::Int.accepts(&Ty::Float));
        assert!(Ty::list(Ty::Unknown).accepts(&Ty::list(Ty::String)));
    }

    #[test]
    fn resolve_reports_unknown_names() {
        let table = SchemaTable::new();
        let ty = TypeExpr::Named {
            name: "List".into(),
            args: vec![TypeExpr::named("Int", Span::null())],
            span: Span::null(),
        };
        assert_eq!(table.resolve(&ty), Ok(Ty::list(Ty::Int)));
        assert_eq!(
            table.resolve(&TypeExpr::named("Widget", Span::null())),
            Err("unknown type 'Widget'".to_string())
        );
    }
}
