use crate::diagnostics::Diagnostic;
use itertools::Itertools;
use std::result;
use thiserror::Error;

/// Fatal outcome of one pipeline phase.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{0}")]
    Syntax(Diagnostic),
    #[error("{}", .0.iter().join("\n"))]
    Type(Vec<Diagnostic>),
    #[error("{0}")]
    Runtime(Diagnostic),
    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// Diagnostics carried by this error, in report order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Error::Syntax(diagnostic) | Error::Runtime(diagnostic) => vec![diagnostic.clone()],
            Error::Type(diagnostics) => diagnostics.clone(),
            Error::Generic(_) => Vec::new(),
        }
    }

    pub fn is_type_error(&self) -> bool {
        matches!(self, Error::Type(_))
    }

    pub fn is_runtime_error(&self) -> bool {
        matches!(self, Error::Runtime(_))
    }
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn type_batch_renders_one_line_per_diagnostic() {
        let err = Error::Type(vec![
            Diagnostic::type_error("first", Span::new(0, 1, 1, 1)),
            Diagnostic::type_error("second", Span::new(5, 6, 2, 4)),
        ]);
        assert_eq!(
            err.to_string(),
            "Type Error (Line 1, Position 1): first\nType Error (Line 2, Position 4): second"
        );
    }
}
