//! Compile-time folding of constant expressions, used to decide refinement
//! predicates statically whenever the checked value is known.

use itertools::Itertools;
use rill_core::ast::{Expr, ExprKind, Literal};
use rill_core::ops::{BinOpKind, UnOpKind};
use rill_core::types::AliasSchema;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Bool(bool),
    Void,
    List(Vec<ConstValue>),
}

impl Display for ConstValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v}"),
            ConstValue::Str(v) => write!(f, "{v:?}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Void => f.write_str("()"),
            ConstValue::List(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}

impl ConstValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            ConstValue::Int(v) => Some(*v as f64),
            ConstValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn compare(&self, other: &ConstValue) -> Option<Ordering> {
        match (self, other) {
            (ConstValue::Int(a), ConstValue::Int(b)) => Some(a.cmp(b)),
            (ConstValue::Str(a), ConstValue::Str(b)) => Some(a.cmp(b)),
            (ConstValue::Bool(a), ConstValue::Bool(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    fn equals(&self, other: &ConstValue) -> bool {
        match (self, other) {
            (ConstValue::List(a), ConstValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => self == other,
            },
        }
    }
}

/// Source of constant values for names that occur in folded expressions.
pub trait ConstScope {
    fn constant(&self, name: &str) -> Option<ConstValue>;
}

impl<F: Fn(&str) -> Option<ConstValue>> ConstScope for F {
    fn constant(&self, name: &str) -> Option<ConstValue> {
        self(name)
    }
}

/// Folds `expr` to a constant, or `None` when any part depends on runtime
/// values or would fail (overflow, division by zero).
pub fn fold(expr: &Expr, scope: &dyn ConstScope) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::Value(literal) => Some(match literal {
            Literal::Int(v) => ConstValue::Int(*v),
            Literal::Float(v) => ConstValue::Float(*v),
            Literal::String(v) => ConstValue::Str(v.clone()),
            Literal::Bool(v) => ConstValue::Bool(*v),
            Literal::Void => ConstValue::Void,
        }),
        ExprKind::Name(name) => scope.constant(name),
        ExprKind::List(list) => list
            .items
            .iter()
            .map(|item| fold(item, scope))
            .collect::<Option<Vec<_>>>()
            .map(ConstValue::List),
        ExprKind::UnOp(un) => match (un.op, fold(&un.operand, scope)?) {
            (UnOpKind::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
            (UnOpKind::Neg, ConstValue::Int(v)) => v.checked_neg().map(ConstValue::Int),
            (UnOpKind::Neg, ConstValue::Float(v)) => Some(ConstValue::Float(-v)),
            _ => None,
        },
        ExprKind::BinOp(bin) => {
            let lhs = fold(&bin.lhs, scope)?;
            // short-circuit before touching the right operand
            match (bin.op, &lhs) {
                (BinOpKind::And, ConstValue::Bool(false)) => return Some(lhs),
                (BinOpKind::Or, ConstValue::Bool(true)) => return Some(lhs),
                _ => {}
            }
            let rhs = fold(&bin.rhs, scope)?;
            binary(bin.op, &lhs, &rhs)
        }
        ExprKind::If(if_expr) => match fold(&if_expr.cond, scope)? {
            ConstValue::Bool(true) => fold(&if_expr.then, scope),
            ConstValue::Bool(false) => match &if_expr.elze {
                Some(elze) => fold(elze, scope),
                None => Some(ConstValue::Void),
            },
            _ => None,
        },
        ExprKind::Block(block) if block.stmts.is_empty() => match &block.tail {
            Some(tail) => fold(tail, scope),
            None => Some(ConstValue::Void),
        },
        ExprKind::Invoke(invoke) => {
            let name = invoke.callee.as_name()?;
            if scope.constant(name).is_some() {
                return None;
            }
            let args = invoke
                .args
                .iter()
                .map(|arg| fold(arg, scope))
                .collect::<Option<Vec<_>>>()?;
            call(name, &args)
        }
        _ => None,
    }
}

fn binary(op: BinOpKind, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    Some(match op {
        BinOpKind::Eq => Bool(lhs.equals(rhs)),
        BinOpKind::Ne => Bool(!lhs.equals(rhs)),
        BinOpKind::Lt => Bool(lhs.compare(rhs)? == Ordering::Less),
        BinOpKind::Le => Bool(lhs.compare(rhs)? != Ordering::Greater),
        BinOpKind::Gt => Bool(lhs.compare(rhs)? == Ordering::Greater),
        BinOpKind::Ge => Bool(lhs.compare(rhs)? != Ordering::Less),
        BinOpKind::And | BinOpKind::Or => match (lhs, rhs) {
            (Bool(_), Bool(b)) => Bool(*b),
            _ => return None,
        },
        BinOpKind::Add => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.checked_add(*b)?),
            (Str(a), Str(b)) => Str(Rc::from(format!("{a}{b}"))),
            _ => Float(lhs.as_f64()? + rhs.as_f64()?),
        },
        BinOpKind::Sub => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.checked_sub(*b)?),
            _ => Float(lhs.as_f64()? - rhs.as_f64()?),
        },
        BinOpKind::Mul => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.checked_mul(*b)?),
            _ => Float(lhs.as_f64()? * rhs.as_f64()?),
        },
        BinOpKind::Div => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.checked_div(*b)?),
            _ => {
                let divisor = rhs.as_f64()?;
                if divisor == 0.0 {
                    return None;
                }
                Float(lhs.as_f64()? / divisor)
            }
        },
        BinOpKind::Mod => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.checked_rem(*b)?),
            _ => return None,
        },
    })
}

fn call(name: &str, args: &[ConstValue]) -> Option<ConstValue> {
    match (name, args) {
        ("len", [ConstValue::Str(s)]) => Some(ConstValue::Int(s.chars().count() as i64)),
        ("len", [ConstValue::List(items)]) => Some(ConstValue::Int(items.len() as i64)),
        ("abs", [ConstValue::Int(v)]) => v.checked_abs().map(ConstValue::Int),
        ("abs", [ConstValue::Float(v)]) => Some(ConstValue::Float(v.abs())),
        ("upper", [ConstValue::Str(s)]) => Some(ConstValue::Str(Rc::from(s.to_uppercase()))),
        ("lower", [ConstValue::Str(s)]) => Some(ConstValue::Str(Rc::from(s.to_lowercase()))),
        ("contains", [ConstValue::Str(s), ConstValue::Str(needle)]) => {
            Some(ConstValue::Bool(s.contains(needle.as_ref())))
        }
        ("contains", [ConstValue::List(items), needle]) => {
            Some(ConstValue::Bool(items.iter().any(|item| item.equals(needle))))
        }
        _ => None,
    }
}

/// Decides `alias`'s predicate for `candidate`. `None` means the predicate
/// cannot be folded and the check is left to run time.
pub fn refinement_holds(
    alias: &AliasSchema,
    candidate: &ConstValue,
    scope: &dyn ConstScope,
) -> Option<bool> {
    let Some(predicate) = &alias.predicate else {
        return Some(true);
    };
    let bound = |name: &str| {
        if name == "value" {
            Some(candidate.clone())
        } else {
            scope.constant(name)
        }
    };
    match fold(predicate, &bound)? {
        ConstValue::Bool(b) => Some(b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::ast::ExprBinOp;
    use rill_core::span::Span;
    use rill_core::types::Ty;

    fn lit(v: i64) -> Rc<Expr> {
        Expr::new(Literal::Int(v), Span::null()).into_ptr()
    }

    fn name(n: &str) -> Rc<Expr> {
        Expr::new(ExprKind::Name(n.to_string()), Span::null()).into_ptr()
    }

    fn bin(op: BinOpKind, lhs: Rc<Expr>, rhs: Rc<Expr>) -> Rc<Expr> {
        Expr::new(ExprBinOp { op, lhs, rhs }, Span::null()).into_ptr()
    }

    fn no_names(_: &str) -> Option<ConstValue> {
        None
    }

    #[test]
    fn folds_arithmetic_and_defers_division_by_zero() {
        let sum = bin(BinOpKind::Add, lit(2), bin(BinOpKind::Mul, lit(3), lit(4)));
        assert_eq!(fold(&sum, &no_names), Some(ConstValue::Int(14)));
        let div = bin(BinOpKind::Div, lit(1), lit(0));
        assert_eq!(fold(&div, &no_names), None);
        assert_eq!(fold(&name("x"), &no_names), None);
    }

    #[test]
    fn percent_refinement() {
        let predicate = bin(
            BinOpKind::And,
            bin(BinOpKind::Ge, name("value"), lit(0)),
            bin(BinOpKind::Le, name("value"), lit(100)),
        );
        let alias = AliasSchema {
            name: "Percent".into(),
            base: Ty::Int,
            predicate: Some(predicate),
        };
        assert_eq!(refinement_holds(&alias, &ConstValue::Int(50), &no_names), Some(true));
        assert_eq!(refinement_holds(&alias, &ConstValue::Int(150), &no_names), Some(false));
    }
}
