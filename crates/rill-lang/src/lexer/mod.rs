//! Lexer utilities and tokenization for Rill.

pub mod tokenizer;
pub mod winnow;

pub use tokenizer::{lex, Keyword, LexerError, Token, TokenKind};
