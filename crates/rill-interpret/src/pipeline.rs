//! Source-to-result driver: parse, resolve imports, check, evaluate.

use crate::engine::Interpreter;
use crate::gateway::{Gateway, NullGateway};
use crate::value::Value;
use itertools::Itertools;
use rill_core::config::InterpreterOptions;
use rill_core::diagnostics::Diagnostic;
use rill_core::module::{resolve_modules, ModuleMap};
use rill_core::Error;
use std::collections::HashMap;
use std::rc::Rc;

/// Name the entry program is registered under during resolution.
pub const MAIN_MODULE: &str = "main";

/// Everything one run produced. A failed run still carries the results
/// and log lines produced before the failure.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub results: Vec<Value>,
    pub log: Vec<String>,
    pub warnings: Vec<Diagnostic>,
    pub error: Option<Error>,
    /// Body executions per named function; memo hits are not counted.
    pub body_evaluations: HashMap<String, usize>,
    pub memo_hits: usize,
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn evaluations_of(&self, function: &str) -> usize {
        self.body_evaluations.get(function).copied().unwrap_or(0)
    }

    /// Warnings then the error, one rendered diagnostic per line.
    pub fn report(&self) -> String {
        self.warnings
            .iter()
            .map(ToString::to_string)
            .chain(self.error.iter().map(ToString::to_string))
            .join("\n")
    }
}

pub struct Pipeline {
    options: InterpreterOptions,
    modules: ModuleMap,
    gateway: Box<dyn Gateway>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            options: InterpreterOptions::from_env(),
            modules: ModuleMap::new(),
            gateway: Box::new(NullGateway::default()),
        }
    }

    pub fn with_options(mut self, options: InterpreterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_gateway(mut self, gateway: impl Gateway + 'static) -> Self {
        self.gateway = Box::new(gateway);
        self
    }

    /// Registers an importable module parsed from `source`.
    pub fn with_module(mut self, name: &str, source: &str) -> rill_core::Result<Self> {
        let program = rill_lang::parse_source(source)?;
        self.modules.insert(name, program);
        Ok(self)
    }

    pub fn run(self, source: &str) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        let program = match rill_lang::parse_source(source) {
            Ok(program) => program,
            Err(err) => {
                outcome.error = Some(err);
                return outcome;
            }
        };
        let resolved = match resolve_modules(MAIN_MODULE, Rc::new(program), &self.modules) {
            Ok(resolved) => resolved,
            Err(diagnostics) => {
                outcome.error = Some(Error::Type(diagnostics));
                return outcome;
            }
        };
        let checked = match rill_typing::check_program(&resolved) {
            Ok(checked) => checked,
            Err(diagnostics) => {
                outcome.error = Some(Error::Type(diagnostics));
                return outcome;
            }
        };
        for warning in &checked.warnings {
            tracing::warn!("{warning}");
        }
        outcome.warnings = checked.warnings.clone();

        let mut interpreter = Interpreter::new(&checked, self.options, self.gateway);
        let execution = interpreter.execute(&resolved);
        outcome.results = execution.results;
        outcome.error = execution.error.map(|err| Error::Runtime(err.to_diagnostic()));
        outcome.log = interpreter.take_log();
        outcome.body_evaluations = interpreter.body_evaluations().clone();
        outcome.memo_hits = interpreter.memo().hits();
        outcome
    }
}

/// Runs a single-module program with default options and no services.
pub fn run_source(source: &str) -> RunOutcome {
    Pipeline::new().run(source)
}
