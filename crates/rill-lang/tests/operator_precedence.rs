use rill_core::ast::{Expr, ExprKind, Literal};
use rill_core::ops::{BinOpKind, UnOpKind};
use rill_lang::parse_expression;

fn parse_expr(src: &str) -> Expr {
    parse_expression(src).unwrap_or_else(|e| panic!("parse failed for `{src}`: {e}"))
}

fn is_name(expr: &Expr, name: &str) -> bool {
    expr.as_name() == Some(name)
}

#[test]
fn precedence_mul_over_add() {
    let expr = parse_expr("1 + 2 * 3");
    let ExprKind::BinOp(add) = &expr.kind else {
        panic!("expected add");
    };
    assert!(matches!(add.op, BinOpKind::Add));
    match &add.rhs.kind {
        ExprKind::BinOp(mul) => assert!(matches!(mul.op, BinOpKind::Mul)),
        other => panic!("rhs should be mul, got {:?}", other),
    }
}

#[test]
fn left_associative_subtraction() {
    let expr = parse_expr("1 - 2 - 3");
    let ExprKind::BinOp(sub1) = &expr.kind else {
        panic!("expected outer sub");
    };
    assert!(matches!(sub1.op, BinOpKind::Sub));
    match &sub1.lhs.kind {
        ExprKind::BinOp(sub2) => assert!(matches!(sub2.op, BinOpKind::Sub)),
        other => panic!("lhs should be nested sub, got {:?}", other),
    }
}

#[test]
fn logical_and_binds_tighter_than_or() {
    let expr = parse_expr("a || b && c");
    let ExprKind::BinOp(or) = &expr.kind else {
        panic!("expected or");
    };
    assert_eq!(or.op, BinOpKind::Or);
    assert!(is_name(&or.lhs, "a"));
    assert!(matches!(&or.rhs.kind, ExprKind::BinOp(and) if and.op == BinOpKind::And));
}

#[test]
fn negative_literals_fold() {
    let expr = parse_expr("-3");
    assert!(matches!(expr.kind, ExprKind::Value(Literal::Int(-3))));
    let expr = parse_expr("-x");
    assert!(matches!(&expr.kind, ExprKind::UnOp(un) if un.op == UnOpKind::Neg));
}

#[test]
fn pipe_prepends_receiver_argument() {
    let expr = parse_expr("xs |> map(|x| x * 2) |> collect");
    let ExprKind::Invoke(outer) = &expr.kind else {
        panic!("expected outer call");
    };
    assert!(is_name(&outer.callee, "collect"));
    assert_eq!(outer.args.len(), 1);
    let ExprKind::Invoke(inner) = &outer.args[0].kind else {
        panic!("expected inner call");
    };
    assert!(is_name(&inner.callee, "map"));
    assert_eq!(inner.args.len(), 2);
    assert!(is_name(&inner.args[0], "xs"));
    assert!(matches!(inner.args[1].kind, ExprKind::Closure(_)));
}

#[test]
fn pipe_has_lowest_precedence() {
    let expr = parse_expr("1 + 2 |> double");
    let ExprKind::Invoke(call) = &expr.kind else {
        panic!("expected call");
    };
    assert!(matches!(&call.args[0].kind, ExprKind::BinOp(add) if add.op == BinOpKind::Add));
}

#[test]
fn await_applies_try_to_awaited_value() {
    let expr = parse_expr("await fetch(url)?");
    let ExprKind::Try(try_expr) = &expr.kind else {
        panic!("expected try at the root, got {:?}", expr.kind);
    };
    assert!(matches!(try_expr.expr.kind, ExprKind::Await(_)));
    assert!(expr.suspends);
}
