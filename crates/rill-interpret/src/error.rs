use crate::value::Value;
use rill_core::diagnostics::Diagnostic;

/// Evaluation failure not handled by user code. A line of `0` means the
/// failure has not been located yet; the nearest enclosing expression
/// fills it in.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub line: u32,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::runtime(self.message.clone(), self.line)
    }
}

/// Non-local exit out of an expression.
#[derive(Debug, Clone)]
pub enum Unwind {
    /// `?` met an `Err` or `None`; the enclosing function evaluates to
    /// `value`.
    Return { value: Value, line: u32 },
    Error(RuntimeError),
}

impl Unwind {
    /// Attaches `line` to an error raised without one.
    pub fn locate(self, line: u32) -> Self {
        match self {
            Unwind::Error(err) if err.line == 0 => Unwind::Error(RuntimeError { line, ..err }),
            other => other,
        }
    }
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(err)
    }
}

impl From<eyre::Report> for Unwind {
    fn from(err: eyre::Report) -> Self {
        Unwind::Error(RuntimeError::new(format!("service gateway failure: {err}"), 0))
    }
}

pub type EvalResult<T> = Result<T, Unwind>;

/// Create an unlocated runtime error
pub fn runtime_error(message: impl Into<String>) -> Unwind {
    Unwind::Error(RuntimeError::new(message, 0))
}

/// Create a runtime error at a source line
pub fn runtime_error_at(message: impl Into<String>, line: u32) -> Unwind {
    Unwind::Error(RuntimeError::new(message, line))
}

/// Macro to return early with a runtime error
#[macro_export]
macro_rules! rt_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::runtime_error(format!($($arg)*)))
    };
}

/// Macro to ensure a condition is true, or return a runtime error
#[macro_export]
macro_rules! rt_ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::rt_bail!($($arg)*);
        }
    };
}
