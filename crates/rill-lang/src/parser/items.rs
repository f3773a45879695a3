use super::{
    advance, comma_list, current_span, expect_ident, expect_keyword, expect_symbol, expected,
    match_keyword, match_symbol, peek_keyword, peek_symbol,
};
use crate::lexer::{Keyword, Token, TokenKind};
use crate::parser::expr::{parse_block, parse_expr, parse_let_stmt};
use rill_core::ast::{
    AliasDecl, EnumDecl, FieldDecl, FunctionDecl, FunctionId, ImportDecl, ImportName, Item,
    ItemKind, Param, RecordDecl, TypeExpr, VariantDecl,
};
use std::rc::Rc;
use winnow::ModalResult;

pub fn parse_items(input: &mut &[Token]) -> ModalResult<Vec<Item>> {
    let mut items = Vec::new();
    while !input.is_empty() {
        if match_symbol(input, ";") {
            continue;
        }
        items.push(parse_item(input)?);
    }
    Ok(items)
}

pub fn parse_item(input: &mut &[Token]) -> ModalResult<Item> {
    let span = current_span(input);
    let exported = match_keyword(input, Keyword::Export);
    let Some(next) = input.first().map(|token| token.kind) else {
        return expected(input, "declaration");
    };
    let kind = match next {
        TokenKind::Keyword(Keyword::Import) if !exported => {
            advance(input);
            ItemKind::Import(parse_import(input)?)
        }
        TokenKind::Keyword(Keyword::Fn) => {
            advance(input);
            ItemKind::Function(parse_fn(input, false, span)?)
        }
        TokenKind::Keyword(Keyword::Async) if peek_keyword(&input[1..], Keyword::Fn) => {
            advance(input);
            advance(input);
            ItemKind::Function(parse_fn(input, true, span)?)
        }
        TokenKind::Keyword(Keyword::Record) => {
            advance(input);
            ItemKind::Record(parse_record(input)?)
        }
        TokenKind::Keyword(Keyword::Enum) => {
            advance(input);
            ItemKind::Enum(parse_enum(input)?)
        }
        TokenKind::Keyword(Keyword::Type) => {
            advance(input);
            ItemKind::Alias(parse_alias(input)?)
        }
        TokenKind::Keyword(Keyword::Let) => {
            advance(input);
            let stmt = parse_let_stmt(input)?;
            expect_symbol(input, ";")?;
            ItemKind::Let(stmt)
        }
        _ if exported => return expected(input, "declaration after `export`"),
        _ => {
            let expr = parse_expr(input)?;
            match_symbol(input, ";");
            ItemKind::Expr(expr)
        }
    };
    Ok(Item {
        kind,
        exported,
        span,
    })
}

fn parse_import(input: &mut &[Token]) -> ModalResult<ImportDecl> {
    expect_symbol(input, "{")?;
    let names = comma_list(input, "}", |input| {
        let (name, span) = expect_ident(input, "imported name")?;
        let alias = if match_keyword(input, Keyword::As) {
            Some(expect_ident(input, "alias")?.0)
        } else {
            None
        };
        Ok(ImportName { name, alias, span })
    })?;
    expect_keyword(input, Keyword::From, "`from`")?;
    let module = match input.first() {
        Some(Token {
            kind: TokenKind::StringLiteral,
            lexeme,
            ..
        }) => lexeme.clone(),
        _ => return expected(input, "module name string"),
    };
    advance(input);
    match_symbol(input, ";");
    Ok(ImportDecl { names, module })
}

fn parse_fn(
    input: &mut &[Token],
    is_async: bool,
    span: rill_core::span::Span,
) -> ModalResult<Rc<FunctionDecl>> {
    let (name, _) = expect_ident(input, "function name")?;
    expect_symbol(input, "(")?;
    let params = comma_list(input, ")", parse_param)?;
    let ret = if match_symbol(input, "->") {
        Some(parse_type(input)?)
    } else {
        None
    };
    let body = if match_symbol(input, "=") {
        let body = parse_expr(input)?;
        match_symbol(input, ";");
        body
    } else {
        parse_block(input)?
    };
    Ok(Rc::new(FunctionDecl {
        id: FunctionId::fresh(),
        name: Some(name),
        params,
        ret,
        body,
        is_async,
        span,
    }))
}

pub(crate) fn parse_param(input: &mut &[Token]) -> ModalResult<Param> {
    let (name, span) = expect_ident(input, "parameter name")?;
    let ty = if match_symbol(input, ":") {
        Some(parse_type(input)?)
    } else {
        None
    };
    Ok(Param { name, ty, span })
}

fn parse_record(input: &mut &[Token]) -> ModalResult<RecordDecl> {
    let (name, _) = expect_ident(input, "record name")?;
    expect_symbol(input, "{")?;
    let fields = comma_list(input, "}", |input| {
        let (name, span) = expect_ident(input, "field name")?;
        expect_symbol(input, ":")?;
        let ty = parse_type(input)?;
        Ok(FieldDecl { name, ty, span })
    })?;
    Ok(RecordDecl { name, fields })
}

fn parse_enum(input: &mut &[Token]) -> ModalResult<EnumDecl> {
    let (name, _) = expect_ident(input, "enum name")?;
    expect_symbol(input, "{")?;
    let variants = comma_list(input, "}", |input| {
        let (name, span) = expect_ident(input, "variant name")?;
        let payload = if match_symbol(input, "(") {
            comma_list(input, ")", parse_type)?
        } else {
            Vec::new()
        };
        Ok(VariantDecl {
            name,
            payload,
            span,
        })
    })?;
    Ok(EnumDecl { name, variants })
}

fn parse_alias(input: &mut &[Token]) -> ModalResult<AliasDecl> {
    let (name, _) = expect_ident(input, "type name")?;
    expect_symbol(input, "=")?;
    let ty = parse_type(input)?;
    let predicate = if match_keyword(input, Keyword::Where) {
        Some(parse_expr(input)?)
    } else {
        None
    };
    match_symbol(input, ";");
    Ok(AliasDecl {
        name,
        ty,
        predicate,
    })
}

pub fn parse_type(input: &mut &[Token]) -> ModalResult<TypeExpr> {
    let span = current_span(input);
    if match_symbol(input, "(") {
        if match_symbol(input, ")") {
            return Ok(TypeExpr::named("Void", span));
        }
        let first = parse_type(input)?;
        if match_symbol(input, ")") {
            return Ok(first);
        }
        expect_symbol(input, ",")?;
        let mut items = vec![first];
        items.extend(comma_list(input, ")", parse_type)?);
        return Ok(TypeExpr::Tuple(items, span));
    }
    if match_keyword(input, Keyword::Fn) {
        expect_symbol(input, "(")?;
        let params = comma_list(input, ")", parse_type)?;
        expect_symbol(input, "->")?;
        let ret = parse_type(input)?;
        return Ok(TypeExpr::Function {
            params,
            ret: Box::new(ret),
            span,
        });
    }
    let (name, span) = expect_ident(input, "type")?;
    let args = if peek_symbol(input, "<") {
        advance(input);
        comma_list(input, ">", parse_type)?
    } else {
        Vec::new()
    };
    Ok(TypeExpr::Named { name, args, span })
}
