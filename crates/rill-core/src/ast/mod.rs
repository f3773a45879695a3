//! AST nodes are built once by the parser and never mutated, so children
//! are shared through `Rc`.

mod expr;
mod item;
mod pat;
mod ty;

pub use expr::*;
pub use item::*;
pub use pat::*;
pub use ty::*;
