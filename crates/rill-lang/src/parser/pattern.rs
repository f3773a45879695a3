use super::{
    advance, comma_list, current_span, expect_ident, expect_symbol, expected, invalid,
    is_type_name, match_symbol, peek_symbol,
};
use crate::lexer::{Keyword, Token, TokenKind};
use rill_core::ast::{FieldPattern, Literal, Pattern, PatternKind};
use std::rc::Rc;
use winnow::ModalResult;

pub fn parse_pattern(input: &mut &[Token]) -> ModalResult<Pattern> {
    let Some(token) = input.first().cloned() else {
        return expected(input, "pattern");
    };
    let span = token.span;
    let kind = match token.kind {
        TokenKind::Int | TokenKind::Float => PatternKind::Literal(parse_number(input, false)?),
        TokenKind::StringLiteral => {
            advance(input);
            PatternKind::Literal(Literal::String(Rc::from(token.lexeme.as_str())))
        }
        TokenKind::Keyword(Keyword::True) => {
            advance(input);
            PatternKind::Literal(Literal::Bool(true))
        }
        TokenKind::Keyword(Keyword::False) => {
            advance(input);
            PatternKind::Literal(Literal::Bool(false))
        }
        TokenKind::Symbol => match token.lexeme.as_str() {
            "-" => {
                advance(input);
                PatternKind::Literal(parse_number(input, true)?)
            }
            "(" => {
                advance(input);
                if match_symbol(input, ")") {
                    PatternKind::Literal(Literal::Void)
                } else {
                    let first = parse_pattern(input)?;
                    if match_symbol(input, ")") {
                        return Ok(first);
                    }
                    expect_symbol(input, ",")?;
                    let mut items = vec![first];
                    items.extend(comma_list(input, ")", parse_pattern)?);
                    PatternKind::Tuple(items)
                }
            }
            "[" => {
                advance(input);
                parse_list_pattern(input)?
            }
            "{" => {
                advance(input);
                let entries = comma_list(input, "}", |input| {
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
                    Ok((key, parse_pattern(input)?))
                })?;
                PatternKind::Map(entries)
            }
            _ => return expected(input, "pattern"),
        },
        TokenKind::Ident => {
            advance(input);
            parse_named_pattern(input, token.lexeme)?
        }
        _ => return expected(input, "pattern"),
    };
    Ok(Pattern::new(kind, span))
}

fn parse_number(input: &mut &[Token], negative: bool) -> ModalResult<Literal> {
    let Some(token) = input.first().cloned() else {
        return expected(input, "numeric literal");
    };
    let cleaned = token.lexeme.replace('_', "");
    let literal = match token.kind {
        TokenKind::Int => match cleaned.parse::<i64>() {
            Ok(v) => Literal::Int(if negative { -v } else { v }),
            Err(_) => return invalid(input, "integer literal"),
        },
        TokenKind::Float => match cleaned.parse::<f64>() {
            Ok(v) => Literal::Float(if negative { -v } else { v }),
            Err(_) => return invalid(input, "float literal"),
        },
        _ => return expected(input, "numeric literal"),
    };
    advance(input);
    Ok(literal)
}

fn parse_inner(input: &mut &[Token]) -> ModalResult<Box<Pattern>> {
    expect_symbol(input, "(")?;
    let inner = parse_pattern(input)?;
    expect_symbol(input, ")")?;
    Ok(Box::new(inner))
}

fn parse_named_pattern(input: &mut &[Token], name: String) -> ModalResult<PatternKind> {
    Ok(match name.as_str() {
        "_" => PatternKind::Wildcard,
        "None" => PatternKind::None,
        "Pending" => PatternKind::Pending,
        "Some" => PatternKind::Some(parse_inner(input)?),
        "Ok" => PatternKind::Ok(parse_inner(input)?),
        "Err" => PatternKind::Err(parse_inner(input)?),
        "Resolved" => PatternKind::Resolved(parse_inner(input)?),
        "Failed" => PatternKind::Failed(parse_inner(input)?),
        _ if is_type_name(&name) && match_symbol(input, "::") => {
            let (variant, _) = expect_ident(input, "variant name")?;
            let payload = if peek_symbol(input, "(") {
                let span = current_span(input);
                advance(input);
                let mut items = comma_list(input, ")", parse_pattern)?;
                if items.len() == 1 {
                    items.pop().map(Box::new)
                } else {
                    Some(Box::new(Pattern::new(PatternKind::Tuple(items), span)))
                }
            } else {
                None
            };
            PatternKind::Variant {
                enum_name: name,
                variant,
                payload,
            }
        }
        _ if is_type_name(&name) && match_symbol(input, "{") => parse_record_pattern(input, name)?,
        _ => PatternKind::Bind(name),
    })
}

fn parse_record_pattern(input: &mut &[Token], name: String) -> ModalResult<PatternKind> {
    let mut fields = Vec::new();
    let mut rest = false;
    loop {
        if match_symbol(input, "}") {
            break;
        }
        if match_symbol(input, "..") {
            rest = true;
            match_symbol(input, ",");
            expect_symbol(input, "}")?;
            break;
        }
        let (field, span) = expect_ident(input, "field name")?;
        let pattern = if match_symbol(input, ":") {
            Some(parse_pattern(input)?)
        } else {
            None
        };
        fields.push(FieldPattern {
            name: field,
            pattern,
            span,
        });
        if !match_symbol(input, ",") {
            expect_symbol(input, "}")?;
            break;
        }
    }
    Ok(PatternKind::Record { name, fields, rest })
}

fn parse_list_pattern(input: &mut &[Token]) -> ModalResult<PatternKind> {
    let mut items = Vec::new();
    let mut rest = None;
    loop {
        if match_symbol(input, "]") {
            break;
        }
        if match_symbol(input, "...") {
            rest = Some(Box::new(parse_pattern(input)?));
            match_symbol(input, ",");
            expect_symbol(input, "]")?;
            break;
        }
        items.push(parse_pattern(input)?);
        if !match_symbol(input, ",") {
            expect_symbol(input, "]")?;
            break;
        }
    }
    Ok(PatternKind::List { items, rest })
}
