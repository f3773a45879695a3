//! Tree-walking evaluator.
//!
//! Expressions that cannot reach an `await` are evaluated recursively by
//! [`Interpreter::eval`]. Everything that can suspend runs inside a task as
//! a [`task::TaskMachine`], which keeps its continuation as an explicit
//! frame stack so the scheduler can park it on a pending future and resume
//! it later. Top-level items are run one after another, each as its own
//! root task, and the scheduler is driven until the item's future settles.

use crate::env::{Env, ModuleId};
use crate::error::{runtime_error, runtime_error_at, EvalResult, RuntimeError, Unwind};
use crate::gateway::{Completion, Gateway, RequestId, ServiceOp, ServiceRequest};
use crate::memo::MemoCache;
use crate::pattern::match_pattern;
use crate::scheduler::{Failure, FutureId, FutureState, Scheduler};
use crate::stream::Apply;
use crate::value::{Callable, Closure, Value};
use rill_core::ast::{ItemKind, PExpr, Pattern};
use rill_core::config::InterpreterOptions;
use rill_core::module::{ModuleUnit, ResolvedProgram, SymbolKind};
use rill_core::types::SchemaTable;
use rill_typing::{builtins, CheckedProgram, PurityTable};
use std::collections::HashMap;
use std::rc::Rc;

mod closures;
mod eval_expr;
mod intrinsics;
mod operators;
mod task;

pub(crate) use task::{Combinator, TaskBody, TaskMachine, TaskStep};

/// Module-level bindings of one module.
#[derive(Debug, Default)]
pub struct ModuleScope {
    pub name: String,
    pub globals: HashMap<String, Value>,
}

/// What one program run produced before it finished or halted.
#[derive(Debug, Default)]
pub struct Execution {
    /// Values of the entry module's top-level expressions, in order.
    pub results: Vec<Value>,
    pub error: Option<RuntimeError>,
}

pub struct Interpreter {
    pub(crate) options: InterpreterOptions,
    pub(crate) schemas: Rc<SchemaTable>,
    pub(crate) purity: PurityTable,
    pub(crate) modules: Vec<ModuleScope>,
    pub(crate) current: ModuleId,
    pub(crate) scheduler: Scheduler<TaskBody>,
    gateway: Box<dyn Gateway>,
    requests: HashMap<RequestId, (FutureId, ServiceOp)>,
    next_request: u64,
    pub(crate) memo: MemoCache,
    log: Vec<String>,
    pub(crate) depth: usize,
    /// Line of the call being evaluated, for failures raised by builtins.
    pub(crate) line: u32,
    steps: usize,
    evaluations: HashMap<String, usize>,
}

impl Interpreter {
    pub fn new(
        checked: &CheckedProgram,
        options: InterpreterOptions,
        gateway: Box<dyn Gateway>,
    ) -> Self {
        Self {
            options,
            schemas: checked.schemas.clone(),
            purity: checked.purity.clone(),
            modules: Vec::new(),
            current: ModuleId(0),
            scheduler: Scheduler::default(),
            gateway,
            requests: HashMap::new(),
            next_request: 1,
            memo: MemoCache::default(),
            log: Vec::new(),
            depth: 0,
            line: 0,
            steps: 0,
            evaluations: HashMap::new(),
        }
    }

    /// Log lines written so far.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn take_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }

    /// How many times the body of the named function actually ran.
    /// Memoized calls are not counted.
    pub fn body_evaluations(&self) -> &HashMap<String, usize> {
        &self.evaluations
    }

    pub fn memo(&self) -> &MemoCache {
        &self.memo
    }

    /// Runs every module in dependency order. Only the entry module's
    /// top-level expressions are reported as results.
    pub fn execute(&mut self, program: &ResolvedProgram) -> Execution {
        let mut execution = Execution::default();
        let last = program.units.len().saturating_sub(1);
        for (index, unit) in program.units.iter().enumerate() {
            let is_main = index == last;
            if let Err(err) = self.run_unit(unit, is_main, &mut execution.results) {
                execution.error = Some(err);
                return execution;
            }
        }
        if let Err(err) = self.drain() {
            execution.error = Some(err);
            return execution;
        }
        for (id, failure) in self.scheduler.futures.unobserved_failures() {
            tracing::warn!(
                "future {} failed without being awaited (line {}): {}",
                id.0,
                failure.line,
                failure.message()
            );
        }
        execution
    }

    fn load_unit(&mut self, unit: &ModuleUnit) -> ModuleId {
        let id = ModuleId(self.modules.len());
        let mut globals = HashMap::new();
        for import in &unit.imports {
            if !matches!(import.kind, SymbolKind::Function | SymbolKind::Value) {
                continue;
            }
            let value = self
                .modules
                .iter()
                .find(|scope| scope.name == import.module)
                .and_then(|scope| scope.globals.get(&import.symbol));
            match value {
                Some(value) => {
                    globals.insert(import.local.clone(), value.clone());
                }
                None => tracing::debug!(
                    "'{}' from '{}' is not bound yet",
                    import.symbol,
                    import.module
                ),
            }
        }
        for item in &unit.program.items {
            if let ItemKind::Function(decl) = &item.kind {
                if let Some(name) = &decl.name {
                    let closure = Closure {
                        decl: decl.clone(),
                        env: Env::empty(),
                        module: id,
                    };
                    globals.insert(name.clone(), Value::function(Callable::Closure(closure)));
                }
            }
        }
        self.modules.push(ModuleScope {
            name: unit.name.clone(),
            globals,
        });
        id
    }

    fn run_unit(
        &mut self,
        unit: &ModuleUnit,
        is_main: bool,
        results: &mut Vec<Value>,
    ) -> Result<(), RuntimeError> {
        let id = self.load_unit(unit);
        tracing::debug!("running module '{}'", unit.name);
        for item in &unit.program.items {
            self.current = id;
            let line = item.span.line;
            match &item.kind {
                ItemKind::Let(stmt) => {
                    let value = self.run_root(stmt.value.clone(), line)?;
                    if let Some(ty) = &stmt.ty {
                        self.check_annotation(ty, &value, line)
                            .map_err(|unwind| unwind_to_error(unwind, line))?;
                    }
                    let bindings = self
                        .destructure(&stmt.pattern, &value)
                        .map_err(|unwind| unwind_to_error(unwind, line))?;
                    if let Some(scope) = self.modules.get_mut(id.0) {
                        scope.globals.extend(bindings);
                    }
                }
                ItemKind::Expr(expr) => {
                    let value = self.run_root(expr.clone(), line)?;
                    let value = match value {
                        Value::Future(future) => self.settle(future, line)?,
                        other => other,
                    };
                    if is_main {
                        results.push(value);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Evaluates a top-level expression as a root task.
    fn run_root(&mut self, expr: PExpr, line: u32) -> Result<Value, RuntimeError> {
        let machine = TaskMachine::new(expr, Env::empty(), self.current, true);
        let future = self.scheduler.spawn(machine.into());
        self.settle(future, line)
    }

    /// Drives the scheduler until `future` settles.
    fn settle(&mut self, future: FutureId, line: u32) -> Result<Value, RuntimeError> {
        loop {
            match self.scheduler.futures.state(future) {
                Some(FutureState::Resolved(value)) => {
                    let value = value.clone();
                    self.scheduler.futures.mark_observed(future);
                    return Ok(value);
                }
                Some(FutureState::Failed(failure)) => {
                    let failure = failure.clone();
                    self.scheduler.futures.mark_observed(future);
                    let line = if failure.line == 0 { line } else { failure.line };
                    return Err(RuntimeError::new(failure.message(), line));
                }
                Some(FutureState::Pending) => {}
                None => return Err(RuntimeError::new("unknown future", line)),
            }
            if !self.step().map_err(|err| locate_error(err, line))? {
                return Err(RuntimeError::new("future can never resolve", line));
            }
        }
    }

    /// Runs remaining tasks and gateway replies until nothing can move.
    fn drain(&mut self) -> Result<(), RuntimeError> {
        while self.step()? {}
        let stuck = self.scheduler.suspended();
        if stuck > 0 {
            tracing::debug!("{stuck} task(s) left waiting on futures that never resolved");
        }
        Ok(())
    }

    /// One unit of progress: a ready task slice, else one gateway reply.
    /// Returns false when neither is available.
    fn step(&mut self) -> Result<bool, RuntimeError> {
        if let Some(task) = self.scheduler.next_ready() {
            self.steps += 1;
            if self.steps > self.options.max_scheduler_steps {
                return Err(RuntimeError::new(
                    format!(
                        "scheduler step limit of {} exceeded",
                        self.options.max_scheduler_steps
                    ),
                    0,
                ));
            }
            self.run_task(task);
            return Ok(true);
        }
        let gateway_failure =
            |err: eyre::Report| RuntimeError::new(format!("service gateway failure: {err}"), 0);
        match self.gateway.poll().map_err(gateway_failure)? {
            Some(completion) => {
                self.complete_request(completion);
                Ok(true)
            }
            // The provider still owes replies; they arrive on its own schedule.
            None if self.gateway.outstanding() > 0 => {
                self.gateway.wait().map_err(gateway_failure)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn run_task(&mut self, mut task: crate::scheduler::Task<TaskBody>) {
        let previous = self.current;
        let (outcome, root) = match &mut task.body {
            TaskBody::Machine(machine) => {
                self.current = machine.module;
                let root = machine.root;
                (self.run_machine(machine), root)
            }
            TaskBody::Combinator(combinator) => (self.run_combinator(combinator), false),
        };
        self.current = previous;
        match outcome {
            Ok(TaskStep::Complete(value)) => self.scheduler.complete(task, value),
            Ok(TaskStep::Suspend(future)) => self.scheduler.suspend(task, future),
            Ok(TaskStep::Fail(failure)) => self.scheduler.fail(task, failure),
            Err(Unwind::Error(err)) => self.scheduler.fail(task, Failure::from(err)),
            Err(unwind @ Unwind::Return { .. }) if root => {
                self.scheduler.fail(task, Failure::from(unwind_to_error(unwind, 0)));
            }
            Err(Unwind::Return { value, .. }) => self.scheduler.complete(task, value),
        }
    }

    pub(crate) fn spawn(&mut self, body: PExpr, env: Env) -> FutureId {
        let machine = TaskMachine::new(body, env, self.current, false);
        self.scheduler.spawn(machine.into())
    }

    pub(crate) fn spawn_combinator(&mut self, combinator: Combinator) -> FutureId {
        self.scheduler.spawn(combinator.into())
    }

    /// Sends a request through the gateway; the returned future settles
    /// with `Ok(reply)` or `Err(message)` once the provider answers.
    pub(crate) fn dispatch_service(
        &mut self,
        op: ServiceOp,
        args: Vec<serde_json::Value>,
    ) -> EvalResult<FutureId> {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        tracing::debug!("dispatching {op} as request {}", id.0);
        self.gateway.dispatch(ServiceRequest { id, op, args })?;
        let future = self.scheduler.futures.create();
        self.requests.insert(id, (future, op));
        Ok(future)
    }

    fn complete_request(&mut self, completion: Completion) {
        let Some((future, op)) = self.requests.remove(&completion.id) else {
            tracing::warn!("reply for unknown request {}", completion.id.0);
            return;
        };
        let value = match completion.reply {
            Ok(json) => Value::ok(match op {
                ServiceOp::TrainModel => Value::Model(Rc::new(json)),
                ServiceOp::Predict => Value::Prediction(Rc::new(json)),
                _ => Value::from_json(&json),
            }),
            Err(message) => Value::err(Value::string(message)),
        };
        self.scheduler.resolve(future, value);
    }

    pub(crate) fn write_log(&mut self, line: String) {
        if self.options.echo_log {
            tracing::info!(target: "rill::log", "{line}");
        }
        self.log.push(line);
    }

    pub(crate) fn count_evaluation(&mut self, name: &str) {
        *self.evaluations.entry(name.to_string()).or_default() += 1;
    }

    /// Resolves a name through the lexical chain, then module globals,
    /// then builtins.
    pub(crate) fn lookup(&self, name: &str, env: &Env) -> EvalResult<Value> {
        if let Some(value) = env.lookup(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self
            .modules
            .get(self.current.0)
            .and_then(|scope| scope.globals.get(name))
        {
            return Ok(value.clone());
        }
        if let Some(sig) = builtins::lookup(name) {
            return Ok(Value::function(Callable::Builtin(sig)));
        }
        if builtins::constant_type(name).is_some() {
            return Ok(Value::none());
        }
        Err(runtime_error(format!("undefined variable '{name}'")))
    }

    /// Binds an irrefutable pattern, failing when the value does not fit.
    pub(crate) fn destructure(
        &self,
        pattern: &Pattern,
        value: &Value,
    ) -> EvalResult<Vec<(String, Value)>> {
        match_pattern(pattern, value, &self.scheduler.futures).ok_or_else(|| {
            runtime_error(format!("value {} does not match the pattern", value.repr()))
        })
    }

    /// Current outcome of a future awaited at `line`. `None` while pending.
    pub(crate) fn await_future(
        &mut self,
        future: FutureId,
        line: u32,
    ) -> EvalResult<Option<Value>> {
        self.scheduler.futures.mark_observed(future);
        match self.scheduler.futures.state(future) {
            Some(FutureState::Resolved(value)) => Ok(Some(value.clone())),
            Some(FutureState::Failed(failure)) => {
                let line = if failure.line == 0 { line } else { failure.line };
                Err(runtime_error_at(failure.message(), line))
            }
            Some(FutureState::Pending) => Ok(None),
            None => Err(runtime_error_at("unknown future", line)),
        }
    }
}

/// A `?` that escapes every function reaches the top level as an error.
fn unwind_to_error(unwind: Unwind, line: u32) -> RuntimeError {
    match unwind.locate(line) {
        Unwind::Error(err) => err,
        Unwind::Return { value, line } => {
            RuntimeError::new(format!("unhandled {} at top level", value.repr()), line)
        }
    }
}

fn locate_error(err: RuntimeError, line: u32) -> RuntimeError {
    if err.line == 0 {
        RuntimeError { line, ..err }
    } else {
        err
    }
}

impl Apply for Interpreter {
    fn apply(&mut self, function: &Value, args: Vec<Value>) -> EvalResult<Value> {
        self.call_value(function.clone(), args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refusing;

    impl Gateway for Refusing {
        fn dispatch(&mut self, _: ServiceRequest) -> eyre::Result<()> {
            eyre::bail!("provider offline")
        }

        fn poll(&mut self) -> eyre::Result<Option<Completion>> {
            Ok(None)
        }

        fn outstanding(&self) -> usize {
            0
        }
    }

    #[test]
    fn refused_dispatch_leaves_no_pending_request() {
        let checked = CheckedProgram {
            schemas: Rc::new(SchemaTable::default()),
            purity: PurityTable::default(),
            warnings: Vec::new(),
        };
        let mut interpreter =
            Interpreter::new(&checked, InterpreterOptions::default(), Box::new(Refusing));
        let Err(Unwind::Error(err)) = interpreter.dispatch_service(ServiceOp::Ask, vec![]) else {
            panic!("expected the dispatch to fail");
        };
        assert_eq!(err.message, "service gateway failure: provider offline");
        assert!(interpreter.requests.is_empty());
        assert!(interpreter.scheduler.futures.is_empty());
    }
}
