//! Recursive-descent parser over the token stream.
//!
//! Sub-parsers follow the winnow `ModalResult` convention: a `Backtrack`
//! error means "not mine, try something else", a `Cut` error is a syntax
//! error located at the first unconsumed token.

use crate::lexer::{self, Keyword, LexerError, Token, TokenKind};
use rill_core::ast::{Expr, Program};
use rill_core::diagnostics::Diagnostic;
use rill_core::span::{LineIndex, Span};
use std::rc::Rc;
use thiserror::Error;
use winnow::combinator::{cut_err, fail};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::{ModalResult, Parser};

pub mod expr;
pub mod items;
pub mod pattern;

pub use expr::parse_expr;
pub use items::parse_items;
pub use pattern::parse_pattern;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexerError),
    #[error("{message}")]
    Syntax { message: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Lex(err) => err.span,
            ParseError::Syntax { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::syntax(self.to_string(), self.span())
    }
}

impl From<ParseError> for rill_core::Error {
    fn from(err: ParseError) -> Self {
        rill_core::Error::Syntax(err.to_diagnostic())
    }
}

/// Parses a whole module.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let tokens = lexer::lex(source)?;
    let mut slice: &[Token] = tokens.as_slice();
    match parse_items(&mut slice) {
        Ok(items) => {
            tracing::debug!("parsed {} top-level items", items.len());
            Ok(Program::new(items))
        }
        Err(err) => Err(syntax_error(source, &err, slice)),
    }
}

/// Parses a single expression; trailing tokens are an error.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = lexer::lex(source)?;
    let mut slice: &[Token] = tokens.as_slice();
    let expr = parse_expr(&mut slice).map_err(|err| syntax_error(source, &err, slice))?;
    if let Some(token) = slice.first() {
        return Err(ParseError::Syntax {
            message: format!("unexpected trailing token '{}'", token.lexeme),
            span: token.span,
        });
    }
    Ok(Rc::unwrap_or_clone(expr))
}

fn syntax_error(source: &str, err: &ErrMode<ContextError>, rest: &[Token]) -> ParseError {
    let expected = describe(err);
    match rest.first() {
        Some(token) => ParseError::Syntax {
            message: format!("{expected}, found '{}'", token.lexeme),
            span: token.span,
        },
        None => ParseError::Syntax {
            message: format!("{expected}, found end of input"),
            span: LineIndex::new(source).end_span(),
        },
    }
}

fn describe(err: &ErrMode<ContextError>) -> String {
    let ctx = match err {
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
        ErrMode::Incomplete(_) => return "incomplete input".to_string(),
    };
    ctx.context()
        .find_map(|context| match context {
            StrContext::Expected(value) => Some(format!("expected {value}")),
            StrContext::Label(label) => Some(format!("invalid {label}")),
            _ => None,
        })
        .unwrap_or_else(|| "unexpected token".to_string())
}

pub(crate) fn expected<T>(input: &mut &[Token], what: &'static str) -> ModalResult<T> {
    cut_err(fail.context(StrContext::Expected(StrContextValue::Description(what))))
        .parse_next(input)
}

pub(crate) fn invalid<T>(input: &mut &[Token], what: &'static str) -> ModalResult<T> {
    cut_err(fail.context(StrContext::Label(what))).parse_next(input)
}

pub(crate) fn matches_symbol(token: Option<&Token>, symbol: &str) -> bool {
    matches!(
        token,
        Some(Token {
            kind: TokenKind::Symbol,
            lexeme,
            ..
        }) if lexeme == symbol
    )
}

pub(crate) fn peek_symbol(input: &[Token], symbol: &str) -> bool {
    matches_symbol(input.first(), symbol)
}

pub(crate) fn match_symbol(input: &mut &[Token], symbol: &str) -> bool {
    if peek_symbol(input, symbol) {
        *input = &input[1..];
        true
    } else {
        false
    }
}

pub(crate) fn expect_symbol(input: &mut &[Token], symbol: &'static str) -> ModalResult<()> {
    if match_symbol(input, symbol) {
        return Ok(());
    }
    cut_err(fail.context(StrContext::Expected(StrContextValue::StringLiteral(symbol))))
        .parse_next(input)
}

pub(crate) fn peek_keyword(input: &[Token], keyword: Keyword) -> bool {
    matches!(
        input.first(),
        Some(Token {
            kind: TokenKind::Keyword(k),
            ..
        }) if *k == keyword
    )
}

pub(crate) fn match_keyword(input: &mut &[Token], keyword: Keyword) -> bool {
    if peek_keyword(input, keyword) {
        *input = &input[1..];
        true
    } else {
        false
    }
}

pub(crate) fn expect_keyword(
    input: &mut &[Token],
    keyword: Keyword,
    what: &'static str,
) -> ModalResult<()> {
    if match_keyword(input, keyword) {
        Ok(())
    } else {
        expected(input, what)
    }
}

pub(crate) fn expect_ident(
    input: &mut &[Token],
    what: &'static str,
) -> ModalResult<(String, Span)> {
    match input.first() {
        Some(Token {
            kind: TokenKind::Ident,
            lexeme,
            span,
        }) => {
            let out = (lexeme.clone(), *span);
            *input = &input[1..];
            Ok(out)
        }
        _ => expected(input, what),
    }
}

pub(crate) fn advance(input: &mut &[Token]) -> Option<Token> {
    let token = input.first().cloned()?;
    *input = &input[1..];
    Some(token)
}

/// Span of the next token, or a null span at end of input.
pub(crate) fn current_span(input: &[Token]) -> Span {
    input.first().map(|t| t.span).unwrap_or_default()
}

pub(crate) fn is_type_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Parses `item (, item)* ,?` up to and including `close`.
pub(crate) fn comma_list<T>(
    input: &mut &[Token],
    close: &'static str,
    mut item: impl FnMut(&mut &[Token]) -> ModalResult<T>,
) -> ModalResult<Vec<T>> {
    let mut out = Vec::new();
    loop {
        if match_symbol(input, close) {
            return Ok(out);
        }
        out.push(item(input)?);
        if !match_symbol(input, ",") {
            expect_symbol(input, close)?;
            return Ok(out);
        }
    }
}
