//! Rill front end: tokenizer and parser producing `rill_core::ast`.

pub mod lexer;
pub mod parser;

pub use parser::{parse_expression, parse_program, ParseError};

use rill_core::ast::Program;

/// Parses `source`, reporting failures as pipeline syntax errors.
pub fn parse_source(source: &str) -> rill_core::Result<Program> {
    parse_program(source).map_err(rill_core::Error::from)
}
