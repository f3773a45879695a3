//! Rill interpreter
//!
//! Evaluates checked Rill programs: an immutable value model, lazy fused
//! streams, a cooperative single-threaded scheduler for `async`/`await`,
//! pure-call memoization and a gateway for external services.

#[macro_use]
pub mod error;

pub mod engine;
pub mod env;
pub mod gateway;
pub mod memo;
pub mod pattern;
pub mod pipeline;
pub mod scheduler;
pub mod stream;
pub mod value;

pub use engine::{Execution, Interpreter};
pub use error::RuntimeError;
pub use gateway::{
    Completion, Gateway, NullGateway, RequestId, ScriptedGateway, ServiceOp, ServiceRequest,
};
pub use pipeline::{run_source, Pipeline, RunOutcome};
pub use value::Value;
