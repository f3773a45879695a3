use crate::ast::{FunctionDecl, Pattern, TypeExpr};
use crate::ops::{BinOpKind, UnOpKind};
use crate::span::Span;
use derive_more::From;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type PExpr = Rc<Expr>;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Bool(bool),
    Void,
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::String(v) => write!(f, "{v:?}"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Void => f.write_str("()"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprList {
    pub items: Vec<PExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprTuple {
    pub items: Vec<PExpr>,
}

/// `{key: value, ...}`; keys are identifiers or string literals.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprMap {
    pub entries: Vec<(String, PExpr)>,
}

/// `Name { field: value, ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct ExprStruct {
    pub name: String,
    pub fields: Vec<FieldInit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub value: PExpr,
    pub span: Span,
}

/// `Enum::Variant(args)`; several arguments form a tuple payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprVariant {
    pub enum_name: String,
    pub variant: String,
    pub args: Vec<PExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprWith {
    pub target: PExpr,
    pub fields: Vec<FieldInit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprSelect {
    pub target: PExpr,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprIndex {
    pub target: PExpr,
    pub index: PExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprInvoke {
    pub callee: PExpr,
    pub args: Vec<PExpr>,
}

/// `receiver.method(args)`: calls a function-valued record field when the
/// receiver has one, otherwise `method(receiver, args)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprMethod {
    pub receiver: PExpr,
    pub method: String,
    pub args: Vec<PExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprBinOp {
    pub op: BinOpKind,
    pub lhs: PExpr,
    pub rhs: PExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprUnOp {
    pub op: UnOpKind,
    pub operand: PExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprIf {
    pub cond: PExpr,
    pub then: PExpr,
    pub elze: Option<PExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprMatch {
    pub scrutinee: PExpr,
    pub arms: Vec<MatchArm>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<PExpr>,
    pub body: PExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprBlock {
    pub stmts: Vec<Stmt>,
    pub tail: Option<PExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let(LetStmt),
    Expr(PExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetStmt {
    pub pattern: Pattern,
    pub ty: Option<TypeExpr>,
    pub value: PExpr,
    pub span: Span,
}

/// `async { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct ExprAsync {
    pub body: PExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprAwait {
    pub future: PExpr,
}

/// `expr?`
#[derive(Debug, Clone, PartialEq)]
pub struct ExprTry {
    pub expr: PExpr,
}

#[derive(Debug, Clone, PartialEq, From)]
pub enum ExprKind {
    Value(Literal),
    Name(String),
    List(ExprList),
    Tuple(ExprTuple),
    Map(ExprMap),
    Struct(ExprStruct),
    Variant(ExprVariant),
    With(ExprWith),
    Select(ExprSelect),
    Index(ExprIndex),
    Invoke(ExprInvoke),
    Method(ExprMethod),
    BinOp(ExprBinOp),
    UnOp(ExprUnOp),
    If(ExprIf),
    Match(ExprMatch),
    Block(ExprBlock),
    Closure(Rc<FunctionDecl>),
    Async(ExprAsync),
    Await(ExprAwait),
    Try(ExprTry),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// True when evaluating this node may reach an `await` without crossing
    /// a closure or `async` boundary.
    pub suspends: bool,
}

impl Expr {
    pub fn new(kind: impl Into<ExprKind>, span: Span) -> Self {
        let kind = kind.into();
        let suspends = match &kind {
            ExprKind::Await(_) => true,
            ExprKind::Closure(_) | ExprKind::Async(_) => false,
            _ => children(&kind).iter().any(|child| child.suspends),
        };
        Self {
            kind,
            span,
            suspends,
        }
    }

    pub fn into_ptr(self) -> PExpr {
        Rc::new(self)
    }

    pub fn line(&self) -> u32 {
        self.span.line
    }

    /// Direct sub-expressions in evaluation order. A closure body is only
    /// reachable through its declaration.
    pub fn children(&self) -> Vec<&PExpr> {
        children(&self.kind)
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

fn children(kind: &ExprKind) -> Vec<&PExpr> {
    match kind {
        ExprKind::Value(_) | ExprKind::Name(_) | ExprKind::Closure(_) => Vec::new(),
        ExprKind::List(list) => list.items.iter().collect(),
        ExprKind::Tuple(tuple) => tuple.items.iter().collect(),
        ExprKind::Map(map) => map.entries.iter().map(|(_, v)| v).collect(),
        ExprKind::Struct(st) => st.fields.iter().map(|f| &f.value).collect(),
        ExprKind::Variant(variant) => variant.args.iter().collect(),
        ExprKind::With(with) => std::iter::once(&with.target)
            .chain(with.fields.iter().map(|f| &f.value))
            .collect(),
        ExprKind::Select(select) => vec![&select.target],
        ExprKind::Index(index) => vec![&index.target, &index.index],
        ExprKind::Invoke(invoke) => std::iter::once(&invoke.callee)
            .chain(invoke.args.iter())
            .collect(),
        ExprKind::Method(method) => std::iter::once(&method.receiver)
            .chain(method.args.iter())
            .collect(),
        ExprKind::BinOp(bin) => vec![&bin.lhs, &bin.rhs],
        ExprKind::UnOp(un) => vec![&un.operand],
        ExprKind::If(ifexpr) => {
            let mut out = vec![&ifexpr.cond, &ifexpr.then];
            out.extend(ifexpr.elze.iter());
            out
        }
        ExprKind::Match(m) => {
            let mut out = vec![&m.scrutinee];
            for arm in &m.arms {
                out.extend(arm.guard.iter());
                out.push(&arm.body);
            }
            out
        }
        ExprKind::Block(block) => {
            let mut out = Vec::with_capacity(block.stmts.len() + 1);
            for stmt in &block.stmts {
                match stmt {
                    Stmt::Let(let_stmt) => out.push(&let_stmt.value),
                    Stmt::Expr(expr) => out.push(expr),
                }
            }
            out.extend(block.tail.iter());
            out
        }
        ExprKind::Async(async_expr) => vec![&async_expr.body],
        ExprKind::Await(await_expr) => vec![&await_expr.future],
        ExprKind::Try(try_expr) => vec![&try_expr.expr],
    }
}

impl ExprBlock {
    pub fn new(stmts: Vec<Stmt>, tail: Option<PExpr>) -> Self {
        Self { stmts, tail }
    }
}
