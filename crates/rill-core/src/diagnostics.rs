use crate::span::Span;
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

/// Which phase produced a diagnostic; this decides the report prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    Syntax,
    Type,
    Runtime,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub code: Option<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    fn at(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            line: span.line,
            column: span.column,
            code: None,
            suggestions: Vec::new(),
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::at(DiagnosticKind::Syntax, message, span)
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::at(DiagnosticKind::Type, message, span)
    }

    pub fn runtime(message: impl Into<String>, line: u32) -> Self {
        Self {
            kind: DiagnosticKind::Runtime,
            message: message.into(),
            line,
            column: 0,
            code: None,
            suggestions: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::at(DiagnosticKind::Warning, message, span)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn level(&self) -> DiagnosticLevel {
        match self.kind {
            DiagnosticKind::Warning => DiagnosticLevel::Warning,
            _ => DiagnosticLevel::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level() == DiagnosticLevel::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DiagnosticKind::Syntax => write!(
                f,
                "Syntax Error (Line {}, Position {}): {}",
                self.line, self.column, self.message
            ),
            DiagnosticKind::Type => write!(
                f,
                "Type Error (Line {}, Position {}): {}",
                self.line, self.column, self.message
            ),
            DiagnosticKind::Runtime => {
                write!(f, "Runtime Error (Line {}): {}", self.line, self.message)
            }
            DiagnosticKind::Warning => write!(
                f,
                "Warning (Line {}, Position {}): {}",
                self.line, self.column, self.message
            ),
        }
    }
}

/// Ordered collection of diagnostics produced by a single pass.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    items: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.items.iter().filter(|d| d.is_error()).cloned().collect()
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.items.iter().filter(|d| !d.is_error()).cloned().collect()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_formats_are_exact() {
        let span = Span::new(0, 1, 3, 7);
        assert_eq!(
            Diagnostic::syntax("expected ')'", span).to_string(),
            "Syntax Error (Line 3, Position 7): expected ')'"
        );
        assert_eq!(
            Diagnostic::type_error("unknown field 'z'", span).to_string(),
            "Type Error (Line 3, Position 7): unknown field 'z'"
        );
        assert_eq!(
            Diagnostic::runtime("index 4 out of bounds", 9).to_string(),
            "Runtime Error (Line 9): index 4 out of bounds"
        );
        assert_eq!(
            Diagnostic::warning("unbounded stream", span).to_string(),
            "Warning (Line 3, Position 7): unbounded stream"
        );
    }
}
