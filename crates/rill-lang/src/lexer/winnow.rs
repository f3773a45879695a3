use winnow::combinator::{alt, cut_err, opt, repeat};
use winnow::error::{ContextError, ErrMode};
use winnow::token::{literal, take_till, take_until, take_while};
use winnow::{ModalResult, Parser};

pub(crate) const MULTI_PUNCT: &[&str] = &[
    "...", "..", "|>", "::", "=>", "->", "==", "!=", "<=", ">=", "&&", "||",
];
pub(crate) const SINGLE_PUNCT: &str = "=+-*/%!<>?:;,.()[]{}|";

pub(crate) fn ws(input: &mut &str) -> ModalResult<()> {
    repeat::<_, _, (), _, _>(0.., alt((whitespace, line_comment, block_comment)))
        .parse_next(input)?;
    Ok(())
}

pub(crate) fn whitespace(input: &mut &str) -> ModalResult<()> {
    take_while(1.., char::is_whitespace)
        .map(|_| ())
        .parse_next(input)
}

pub(crate) fn line_comment(input: &mut &str) -> ModalResult<()> {
    literal("//").parse_next(input)?;
    take_till(0.., |c: char| c == '\n').parse_next(input)?;
    opt(literal("\n")).parse_next(input)?;
    Ok(())
}

pub(crate) fn block_comment(input: &mut &str) -> ModalResult<()> {
    literal("/*").parse_next(input)?;
    cut_err(take_until(0.., "*/")).parse_next(input)?;
    literal("*/").parse_next(input)?;
    Ok(())
}

/// Consumes a double-quoted literal and returns its unescaped contents.
pub(crate) fn parse_string_literal(input: &mut &str) -> ModalResult<String> {
    let slice = *input;
    if !slice.starts_with('"') {
        return Err(backtrack_err());
    }
    let mut out = String::new();
    let mut chars = slice.char_indices().skip(1);
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => {
                *input = &slice[idx + 1..];
                return Ok(out);
            }
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            '\n' => break,
            other => out.push(other),
        }
    }
    Err(ErrMode::Cut(ContextError::new()))
}

pub(crate) fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

pub(crate) fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphanumeric()
}

pub(crate) fn backtrack_err() -> ErrMode<ContextError> {
    ErrMode::Backtrack(ContextError::new())
}
