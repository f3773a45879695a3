use crate::ast::{LetStmt, PExpr, TypeExpr};
use crate::span::Span;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of one function declaration or lambda literal. Memoization and
/// purity results are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        FunctionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for FunctionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub id: FunctionId,
    /// `None` for lambdas.
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: PExpr,
    pub is_async: bool,
    pub span: Span,
}

impl FunctionDecl {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<lambda>")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantDecl {
    pub name: String,
    pub payload: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<VariantDecl>,
}

/// `type Name = Base where predicate;` The predicate refers to the
/// candidate as `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub predicate: Option<PExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
}

impl ImportName {
    pub fn local(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub names: Vec<ImportName>,
    pub module: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Import(ImportDecl),
    Function(Rc<FunctionDecl>),
    Record(RecordDecl),
    Enum(EnumDecl),
    Alias(AliasDecl),
    Let(LetStmt),
    Expr(PExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub exported: bool,
    pub span: Span,
}

impl Item {
    /// Names this item declares at module scope.
    pub fn declared_names(&self) -> Vec<&str> {
        match &self.kind {
            ItemKind::Import(import) => import.names.iter().map(ImportName::local).collect(),
            ItemKind::Function(func) => func.name.as_deref().into_iter().collect(),
            ItemKind::Record(record) => vec![record.name.as_str()],
            ItemKind::Enum(decl) => vec![decl.name.as_str()],
            ItemKind::Alias(alias) => vec![alias.name.as_str()],
            ItemKind::Let(let_stmt) => let_stmt.pattern.bindings(),
            ItemKind::Expr(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn imports(&self) -> impl Iterator<Item = (&ImportDecl, Span)> {
        self.items.iter().filter_map(|item| match &item.kind {
            ItemKind::Import(import) => Some((import, item.span)),
            _ => None,
        })
    }

    /// Exported item declaring `name`, if any.
    pub fn find_export(&self, name: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|item| item.exported && item.declared_names().contains(&name))
    }

    pub fn declares(&self, name: &str) -> bool {
        self.items
            .iter()
            .any(|item| {
                !matches!(item.kind, ItemKind::Import(_)) && item.declared_names().contains(&name)
            })
    }
}
