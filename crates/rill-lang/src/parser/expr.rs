use super::{
    advance, comma_list, current_span, expect_ident, expect_symbol, expected, invalid,
    is_type_name, match_keyword, match_symbol, matches_symbol, peek_keyword, peek_symbol,
};
use crate::lexer::{Keyword, Token, TokenKind};
use crate::parser::items::{parse_param, parse_type};
use crate::parser::pattern::parse_pattern;
use rill_core::ast::{
    Expr, ExprAsync, ExprAwait, ExprBinOp, ExprBlock, ExprIf, ExprIndex, ExprInvoke, ExprKind,
    ExprList, ExprMap, ExprMatch, ExprMethod, ExprSelect, ExprStruct, ExprTry, ExprTuple,
    ExprUnOp, ExprVariant, ExprWith, FieldInit, FunctionDecl, FunctionId, LetStmt, Literal,
    MatchArm, PExpr, Stmt,
};
use rill_core::ops::{BinOpKind, UnOpKind};
use rill_core::span::Span;
use std::rc::Rc;
use std::str::FromStr;
use winnow::ModalResult;

pub fn parse_expr(input: &mut &[Token]) -> ModalResult<PExpr> {
    parse_expr_prec(input, 0)
}

#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Pipe,
    Bin(BinOpKind),
}

const PIPE_PRECEDENCE: u8 = 1;

fn peek_binop(input: &[Token]) -> Option<(u8, BinaryOp, Span)> {
    let token = input.first()?;
    if token.kind != TokenKind::Symbol {
        return None;
    }
    if token.lexeme == "|>" {
        return Some((PIPE_PRECEDENCE, BinaryOp::Pipe, token.span));
    }
    let op = BinOpKind::from_str(&token.lexeme).ok()?;
    Some((op.precedence(), BinaryOp::Bin(op), token.span))
}

pub(crate) fn parse_expr_prec(input: &mut &[Token], min_prec: u8) -> ModalResult<PExpr> {
    let mut left = parse_prefix(input)?;
    loop {
        let Some((prec, op, span)) = peek_binop(input) else {
            break;
        };
        if prec < min_prec {
            break;
        }
        advance(input);
        let right = parse_expr_prec(input, prec + 1)?;
        left = match op {
            BinaryOp::Pipe => pipe_into(left, right),
            BinaryOp::Bin(op) => Expr::new(
                ExprBinOp {
                    op,
                    lhs: left,
                    rhs: right,
                },
                span,
            )
            .into_ptr(),
        };
    }
    Ok(left)
}

/// `x |> f(a)` is `f(x, a)`; `x |> f` is `f(x)`.
fn pipe_into(value: PExpr, target: PExpr) -> PExpr {
    let span = target.span;
    let invoke = match &target.kind {
        ExprKind::Invoke(invoke) => ExprInvoke {
            callee: invoke.callee.clone(),
            args: std::iter::once(value)
                .chain(invoke.args.iter().cloned())
                .collect(),
        },
        _ => ExprInvoke {
            callee: target,
            args: vec![value],
        },
    };
    Expr::new(invoke, span).into_ptr()
}

fn parse_prefix(input: &mut &[Token]) -> ModalResult<PExpr> {
    let span = current_span(input);
    if match_symbol(input, "-") {
        let operand = parse_prefix(input)?;
        return Ok(negate(operand, span));
    }
    if match_symbol(input, "!") {
        let operand = parse_prefix(input)?;
        return Ok(Expr::new(
            ExprUnOp {
                op: UnOpKind::Not,
                operand,
            },
            span,
        )
        .into_ptr());
    }
    if match_keyword(input, Keyword::Await) {
        // `await f(x)?` applies `?` to the awaited value.
        let operand = if peek_keyword(input, Keyword::Await) {
            parse_prefix(input)?
        } else {
            let atom = parse_atom(input)?;
            parse_postfix(input, atom, false)?
        };
        let awaited = Expr::new(ExprAwait { future: operand }, span).into_ptr();
        return parse_postfix(input, awaited, true);
    }
    let atom = parse_atom(input)?;
    parse_postfix(input, atom, true)
}

fn negate(operand: PExpr, span: Span) -> PExpr {
    let kind: ExprKind = match &operand.kind {
        ExprKind::Value(Literal::Int(v)) => Literal::Int(v.wrapping_neg()).into(),
        ExprKind::Value(Literal::Float(v)) => Literal::Float(-v).into(),
        _ => ExprUnOp {
            op: UnOpKind::Neg,
            operand,
        }
        .into(),
    };
    Expr::new(kind, span).into_ptr()
}

fn parse_postfix(input: &mut &[Token], mut expr: PExpr, allow_try: bool) -> ModalResult<PExpr> {
    loop {
        if match_symbol(input, "(") {
            let args = comma_list(input, ")", parse_expr)?;
            let span = expr.span;
            expr = Expr::new(ExprInvoke { callee: expr, args }, span).into_ptr();
            continue;
        }
        if match_symbol(input, ".") {
            let Some(token) = input.first().cloned() else {
                return expected(input, "field name");
            };
            let field = match token.kind {
                TokenKind::Ident | TokenKind::Int => token.lexeme,
                _ => return expected(input, "field name"),
            };
            advance(input);
            if token.kind == TokenKind::Ident && match_symbol(input, "(") {
                let args = comma_list(input, ")", parse_expr)?;
                expr = Expr::new(
                    ExprMethod {
                        receiver: expr,
                        method: field,
                        args,
                    },
                    token.span,
                )
                .into_ptr();
            } else {
                expr = Expr::new(
                    ExprSelect {
                        target: expr,
                        field,
                    },
                    token.span,
                )
                .into_ptr();
            }
            continue;
        }
        if peek_symbol(input, "[") {
            let span = current_span(input);
            advance(input);
            let index = parse_expr(input)?;
            expect_symbol(input, "]")?;
            expr = Expr::new(
                ExprIndex {
                    target: expr,
                    index,
                },
                span,
            )
            .into_ptr();
            continue;
        }
        if allow_try && peek_symbol(input, "?") {
            let span = current_span(input);
            advance(input);
            expr = Expr::new(ExprTry { expr }, span).into_ptr();
            continue;
        }
        if peek_keyword(input, Keyword::With) {
            let span = current_span(input);
            advance(input);
            expect_symbol(input, "{")?;
            let fields = comma_list(input, "}", parse_field_init)?;
            expr = Expr::new(
                ExprWith {
                    target: expr,
                    fields,
                },
                span,
            )
            .into_ptr();
            continue;
        }
        break;
    }
    Ok(expr)
}

fn parse_atom(input: &mut &[Token]) -> ModalResult<PExpr> {
    let Some(token) = input.first().cloned() else {
        return expected(input, "expression");
    };
    let span = token.span;
    let literal = |lit: Literal| Expr::new(lit, span).into_ptr();
    match token.kind {
        TokenKind::Int => {
            let Ok(value) = token.lexeme.replace('_', "").parse::<i64>() else {
                return invalid(input, "integer literal");
            };
            advance(input);
            Ok(literal(Literal::Int(value)))
        }
        TokenKind::Float => {
            let Ok(value) = token.lexeme.replace('_', "").parse::<f64>() else {
                return invalid(input, "float literal");
            };
            advance(input);
            Ok(literal(Literal::Float(value)))
        }
        TokenKind::StringLiteral => {
            advance(input);
            Ok(literal(Literal::String(Rc::from(token.lexeme.as_str()))))
        }
        TokenKind::Keyword(Keyword::True) => {
            advance(input);
            Ok(literal(Literal::Bool(true)))
        }
        TokenKind::Keyword(Keyword::False) => {
            advance(input);
            Ok(literal(Literal::Bool(false)))
        }
        TokenKind::Keyword(Keyword::If) => {
            advance(input);
            parse_if(input, span)
        }
        TokenKind::Keyword(Keyword::Match) => {
            advance(input);
            parse_match(input, span)
        }
        TokenKind::Keyword(Keyword::Async) => {
            advance(input);
            if peek_symbol(input, "{") {
                let body = parse_block(input)?;
                Ok(Expr::new(ExprAsync { body }, span).into_ptr())
            } else if peek_symbol(input, "|") || peek_symbol(input, "||") {
                parse_closure(input, true, span)
            } else {
                expected(input, "block or closure after `async`")
            }
        }
        TokenKind::Ident => {
            advance(input);
            parse_name(input, token.lexeme, span)
        }
        TokenKind::Symbol => match token.lexeme.as_str() {
            "(" => {
                advance(input);
                parse_paren(input, span)
            }
            "[" => {
                advance(input);
                let items = comma_list(input, "]", parse_expr)?;
                Ok(Expr::new(ExprList { items }, span).into_ptr())
            }
            "{" if looks_like_map(input) => {
                advance(input);
                let entries = comma_list(input, "}", parse_map_entry)?;
                Ok(Expr::new(ExprMap { entries }, span).into_ptr())
            }
            "{" => parse_block(input),
            "|" | "||" => parse_closure(input, false, span),
            _ => expected(input, "expression"),
        },
        _ => expected(input, "expression"),
    }
}

fn parse_name(input: &mut &[Token], name: String, span: Span) -> ModalResult<PExpr> {
    if match_symbol(input, "::") {
        let (variant, _) = expect_ident(input, "variant name")?;
        let args = if match_symbol(input, "(") {
            comma_list(input, ")", parse_expr)?
        } else {
            Vec::new()
        };
        return Ok(Expr::new(
            ExprVariant {
                enum_name: name,
                variant,
                args,
            },
            span,
        )
        .into_ptr());
    }
    if is_type_name(&name) && looks_like_record(input) {
        advance(input);
        let fields = comma_list(input, "}", parse_field_init)?;
        return Ok(Expr::new(ExprStruct { name, fields }, span).into_ptr());
    }
    Ok(Expr::new(ExprKind::Name(name), span).into_ptr())
}

/// `Name {` opens a record literal only when followed by `}` or a field.
fn looks_like_record(input: &[Token]) -> bool {
    if !matches_symbol(input.first(), "{") {
        return false;
    }
    if matches_symbol(input.get(1), "}") {
        return true;
    }
    matches!(input.get(1), Some(Token { kind: TokenKind::Ident, .. }))
        && (matches_symbol(input.get(2), ":")
            || matches_symbol(input.get(2), ",")
            || matches_symbol(input.get(2), "}"))
}

/// `{}` and `{key: ...` are maps; anything else is a block.
fn looks_like_map(input: &[Token]) -> bool {
    if matches_symbol(input.get(1), "}") {
        return true;
    }
    matches!(
        input.get(1),
        Some(Token {
            kind: TokenKind::Ident | TokenKind::StringLiteral,
            ..
        })
    ) && matches_symbol(input.get(2), ":")
}

fn parse_map_entry(input: &mut &[Token]) -> ModalResult<(String, PExpr)> {
    let key = match input.first() {
        Some(Token {
            kind: TokenKind::Ident | TokenKind::StringLiteral,
            lexeme,
            ..
        }) => lexeme.clone(),
        _ => return expected(input, "map key"),
    };
    advance(input);
    expect_symbol(input, ":")?;
    let value = parse_expr(input)?;
    Ok((key, value))
}

fn parse_field_init(input: &mut &[Token]) -> ModalResult<FieldInit> {
    let (name, span) = expect_ident(input, "field name")?;
    let value = if match_symbol(input, ":") {
        parse_expr(input)?
    } else {
        Expr::new(ExprKind::Name(name.clone()), span).into_ptr()
    };
    Ok(FieldInit { name, value, span })
}

fn parse_paren(input: &mut &[Token], span: Span) -> ModalResult<PExpr> {
    if match_symbol(input, ")") {
        return Ok(Expr::new(Literal::Void, span).into_ptr());
    }
    let first = parse_expr(input)?;
    if match_symbol(input, ")") {
        return Ok(first);
    }
    expect_symbol(input, ",")?;
    let mut items = vec![first];
    items.extend(comma_list(input, ")", parse_expr)?);
    Ok(Expr::new(ExprTuple { items }, span).into_ptr())
}

fn parse_closure(input: &mut &[Token], is_async: bool, span: Span) -> ModalResult<PExpr> {
    let params = if match_symbol(input, "||") {
        Vec::new()
    } else {
        expect_symbol(input, "|")?;
        comma_list(input, "|", parse_param)?
    };
    let body = parse_expr(input)?;
    let decl = FunctionDecl {
        id: FunctionId::fresh(),
        name: None,
        params,
        ret: None,
        body,
        is_async,
        span,
    };
    Ok(Expr::new(ExprKind::Closure(Rc::new(decl)), span).into_ptr())
}

fn parse_if(input: &mut &[Token], span: Span) -> ModalResult<PExpr> {
    let cond = parse_expr(input)?;
    let then = parse_block(input)?;
    let elze = if match_keyword(input, Keyword::Else) {
        if peek_keyword(input, Keyword::If) {
            let nested = current_span(input);
            advance(input);
            Some(parse_if(input, nested)?)
        } else {
            Some(parse_block(input)?)
        }
    } else {
        None
    };
    Ok(Expr::new(ExprIf { cond, then, elze }, span).into_ptr())
}

fn parse_match(input: &mut &[Token], span: Span) -> ModalResult<PExpr> {
    let scrutinee = parse_expr(input)?;
    expect_symbol(input, "{")?;
    let mut arms = Vec::new();
    loop {
        if match_symbol(input, "}") {
            break;
        }
        let arm_span = current_span(input);
        let pattern = parse_pattern(input)?;
        let guard = if match_keyword(input, Keyword::If) {
            Some(parse_expr(input)?)
        } else {
            None
        };
        expect_symbol(input, "=>")?;
        let body = parse_expr(input)?;
        arms.push(MatchArm {
            pattern,
            guard,
            body,
            span: arm_span,
        });
        if !match_symbol(input, ",") && !peek_symbol(input, "}") && !is_block_like(&arms) {
            return expected(input, "`,` or `}` after match arm");
        }
    }
    Ok(Expr::new(ExprMatch { scrutinee, arms }, span).into_ptr())
}

fn is_block_like(arms: &[MatchArm]) -> bool {
    arms.last()
        .is_some_and(|arm| matches!(arm.body.kind, ExprKind::Block(_)))
}

pub(crate) fn parse_block(input: &mut &[Token]) -> ModalResult<PExpr> {
    let span = current_span(input);
    expect_symbol(input, "{")?;
    let block = parse_block_body(input)?;
    Ok(Expr::new(block, span).into_ptr())
}

fn parse_block_body(input: &mut &[Token]) -> ModalResult<ExprBlock> {
    let mut stmts = Vec::new();
    let mut tail = None;
    loop {
        if match_symbol(input, "}") {
            break;
        }
        if input.is_empty() {
            return expected(input, "`}`");
        }
        // Stray semicolons are empty statements.
        if match_symbol(input, ";") {
            continue;
        }
        if match_keyword(input, Keyword::Let) {
            let stmt = parse_let_stmt(input)?;
            expect_symbol(input, ";")?;
            stmts.push(Stmt::Let(stmt));
            continue;
        }
        let expr = parse_expr(input)?;
        if match_symbol(input, ";") {
            stmts.push(Stmt::Expr(expr));
            continue;
        }
        if match_symbol(input, "}") {
            tail = Some(expr);
            break;
        }
        let control_like = matches!(
            expr.kind,
            ExprKind::If(_) | ExprKind::Match(_) | ExprKind::Block(_)
        );
        if !control_like {
            return expected(input, "`;` or `}`");
        }
        stmts.push(Stmt::Expr(expr));
    }
    Ok(ExprBlock::new(stmts, tail))
}

/// Parses the remainder of a `let` after the keyword, without the `;`.
pub(crate) fn parse_let_stmt(input: &mut &[Token]) -> ModalResult<LetStmt> {
    let span = current_span(input);
    let pattern = parse_pattern(input)?;
    let ty = if match_symbol(input, ":") {
        Some(parse_type(input)?)
    } else {
        None
    };
    expect_symbol(input, "=")?;
    let value = parse_expr(input)?;
    Ok(LetStmt {
        pattern,
        ty,
        value,
        span,
    })
}
