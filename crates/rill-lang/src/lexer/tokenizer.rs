use super::winnow::{
    backtrack_err, is_ident_continue, is_ident_start, parse_string_literal, ws, MULTI_PUNCT,
    SINGLE_PUNCT,
};
use rill_core::span::{LineIndex, Span};
use thiserror::Error;
use winnow::combinator::{alt, opt};
use winnow::error::ErrMode;
use winnow::token::{one_of, take_while};
use winnow::{ModalResult, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Fn,
    Async,
    Await,
    Match,
    If,
    Else,
    Record,
    Enum,
    Type,
    Where,
    Import,
    Export,
    From,
    As,
    With,
    True,
    False,
}

impl Keyword {
    fn from_lexeme(lexeme: &str) -> Option<Self> {
        match lexeme {
            "let" => Some(Self::Let),
            "fn" => Some(Self::Fn),
            "async" => Some(Self::Async),
            "await" => Some(Self::Await),
            "match" => Some(Self::Match),
            "if" => Some(Self::If),
            "else" => Some(Self::Else),
            "record" => Some(Self::Record),
            "enum" => Some(Self::Enum),
            "type" => Some(Self::Type),
            "where" => Some(Self::Where),
            "import" => Some(Self::Import),
            "export" => Some(Self::Export),
            "from" => Some(Self::From),
            "as" => Some(Self::As),
            "with" => Some(Self::With),
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token; for string literals the unescaped contents.
    pub lexeme: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    StringLiteral,
    Symbol,
    Keyword(Keyword),
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct LexerError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, LexerError> {
    let index = LineIndex::new(source);
    let mut input = source;
    let mut tokens = Vec::new();
    loop {
        let before_ws = source.len() - input.len();
        if let Err(err) = ws.parse_next(&mut input) {
            return Err(match err {
                ErrMode::Cut(_) => LexerError {
                    message: "unterminated block comment".to_string(),
                    span: index.span(before_ws, before_ws),
                },
                _ => LexerError {
                    message: "invalid whitespace".to_string(),
                    span: index.span(before_ws, before_ws),
                },
            });
        }
        if input.is_empty() {
            break;
        }
        let start = source.len() - input.len();
        let mut lexeme = None;
        let kind = match token_parser(&mut input, &mut lexeme) {
            Ok(kind) => kind,
            Err(ErrMode::Cut(_)) => {
                return Err(LexerError {
                    message: "unterminated string literal".to_string(),
                    span: index.span(start, start),
                })
            }
            Err(_) => {
                let found = input.chars().next().unwrap_or_default();
                return Err(LexerError {
                    message: format!("unexpected character '{found}'"),
                    span: index.span(start, start),
                });
            }
        };
        let end = source.len() - input.len();
        let text = lexeme.unwrap_or_else(|| source[start..end].to_string());
        let kind = match kind {
            TokenKind::Ident => Keyword::from_lexeme(&text)
                .map(TokenKind::Keyword)
                .unwrap_or(TokenKind::Ident),
            other => other,
        };
        tokens.push(Token {
            kind,
            lexeme: text,
            span: index.span(start, end),
        });
    }
    Ok(tokens)
}

fn token_parser(input: &mut &str, cooked: &mut Option<String>) -> ModalResult<TokenKind> {
    if input.starts_with('"') {
        let text = parse_string_literal(input)?;
        *cooked = Some(text);
        return Ok(TokenKind::StringLiteral);
    }
    alt((number_token, ident_token, symbol_token)).parse_next(input)
}

fn number_token(input: &mut &str) -> ModalResult<TokenKind> {
    take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    take_while(0.., |c: char| c.is_ascii_digit() || c == '_').parse_next(input)?;
    // A fraction needs a digit after the dot so `xs.0` and `1..` stay intact.
    let fraction = opt((
        '.',
        one_of(|c: char| c.is_ascii_digit()),
        take_while(0.., |c: char| c.is_ascii_digit() || c == '_'),
    ))
    .parse_next(input)?;
    Ok(if fraction.is_some() {
        TokenKind::Float
    } else {
        TokenKind::Int
    })
}

fn ident_token(input: &mut &str) -> ModalResult<TokenKind> {
    (
        take_while(1, is_ident_start),
        take_while(0.., is_ident_continue),
    )
        .parse_next(input)
        .map(|_| TokenKind::Ident)
}

fn symbol_token(input: &mut &str) -> ModalResult<TokenKind> {
    alt((
        multi_punct_token.map(|_| TokenKind::Symbol),
        single_punct_token.map(|_| TokenKind::Symbol),
    ))
    .parse_next(input)
}

fn multi_punct_token(input: &mut &str) -> ModalResult<&'static str> {
    for sym in MULTI_PUNCT {
        if let Some(rest) = input.strip_prefix(sym) {
            *input = rest;
            return Ok(*sym);
        }
    }
    Err(backtrack_err())
}

fn single_punct_token(input: &mut &str) -> ModalResult<char> {
    one_of(|c: char| SINGLE_PUNCT.contains(c)).parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn float_requires_digit_after_dot() {
        assert_eq!(
            kinds("pair.0 1.5"),
            vec![
                TokenKind::Ident,
                TokenKind::Symbol,
                TokenKind::Int,
                TokenKind::Float
            ]
        );
    }

    #[test]
    fn keywords_are_recognised() {
        assert_eq!(
            kinds("let x"),
            vec![TokenKind::Keyword(Keyword::Let), TokenKind::Ident]
        );
    }
}
