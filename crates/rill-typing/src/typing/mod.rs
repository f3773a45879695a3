pub mod builtins;
pub mod env;
mod infer_expr;
mod infer_stmt;
mod patterns;
pub mod purity;
pub mod refine;
mod schema;
