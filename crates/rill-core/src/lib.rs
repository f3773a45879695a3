//! Rill core
//!
//! Shared building blocks for the Rill toolchain: source spans, the
//! diagnostic/error taxonomy, the abstract syntax tree, declared type
//! descriptors and structural module resolution.

#[macro_use]
pub mod macros;

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod module;
pub mod ops;
pub mod span;
pub mod types;

// Re-export commonly used items for convenience
pub use tracing;

pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
