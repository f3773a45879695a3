//! Task bodies run by the scheduler.
//!
//! A [`TaskMachine`] evaluates an expression that may reach `await`. Its
//! continuation lives in an explicit frame stack: when an awaited future is
//! still pending the machine returns [`TaskStep::Suspend`] and is resumed
//! later from the same frame. Sub-expressions that cannot suspend are
//! handed to the recursive evaluator in one go.

use super::*;
use derive_more::From;
use rill_core::ast::{ExprKind, Stmt};
use rill_core::ops::BinOpKind;

/// Outcome of running a task until it cannot continue.
#[derive(Debug)]
pub(crate) enum TaskStep {
    Complete(Value),
    Suspend(FutureId),
    Fail(Failure),
}

#[derive(Debug, From)]
pub(crate) enum TaskBody {
    Machine(TaskMachine),
    Combinator(Combinator),
}

#[derive(Debug)]
enum Pending {
    Let(usize),
    Discard,
}

#[derive(Debug)]
enum Frame {
    Eval { expr: PExpr, env: Env },
    /// Children evaluated in order, then combined.
    Strict { expr: PExpr, env: Env, values: Vec<Value> },
    Branch { expr: PExpr, env: Env },
    Arms { expr: PExpr, env: Env },
    Logic { expr: PExpr, env: Env, rhs: bool },
    Block { expr: PExpr, env: Env, next: usize, pending: Pending },
    Await { line: u32 },
    Resume { future: FutureId, line: u32 },
    Try { line: u32 },
}

#[derive(Debug)]
pub(crate) struct TaskMachine {
    stack: Vec<Frame>,
    /// Result of the sub-expression that finished last.
    value: Option<Value>,
    pub(crate) module: ModuleId,
    /// Top-level item: a `?` escaping it is an error rather than a result.
    pub(crate) root: bool,
}

impl TaskMachine {
    pub(crate) fn new(expr: PExpr, env: Env, module: ModuleId, root: bool) -> Self {
        Self {
            stack: vec![Frame::Eval { expr, env }],
            value: None,
            module,
            root,
        }
    }

    fn take(&mut self) -> Value {
        self.value.take().unwrap_or(Value::Void)
    }

    fn push_eval(&mut self, expr: &PExpr, env: &Env) {
        self.stack.push(Frame::Eval {
            expr: expr.clone(),
            env: env.clone(),
        });
    }
}

/// Future-combinator tasks created by `on_error`, `then` and friends.
#[derive(Debug)]
pub(crate) enum Combinator {
    OnError { source: FutureId, handler: Value },
    OnComplete { source: FutureId, handler: Value },
    Then { source: FutureId, handler: Value },
    All { sources: Vec<FutureId>, values: Vec<Value> },
    /// Settles like another future.
    Forward(FutureId),
}

impl Interpreter {
    pub(crate) fn run_machine(&mut self, machine: &mut TaskMachine) -> EvalResult<TaskStep> {
        while let Some(frame) = machine.stack.pop() {
            match frame {
                Frame::Eval { expr, env } => {
                    if expr.suspends {
                        self.begin(machine, expr, env)?;
                    } else {
                        machine.value = Some(self.eval(&expr, &env)?);
                    }
                }
                Frame::Strict { expr, env, mut values } => {
                    values.push(machine.take());
                    let child = expr.children().get(values.len()).map(|child| (*child).clone());
                    if let Some(child) = child {
                        machine.stack.push(Frame::Strict { expr, env: env.clone(), values });
                        machine.push_eval(&child, &env);
                    } else {
                        let value = self
                            .combine(&expr, &env, values)
                            .map_err(|unwind| unwind.locate(expr.line()))?;
                        machine.value = Some(value);
                    }
                }
                Frame::Branch { expr, env } => {
                    let ExprKind::If(if_expr) = &expr.kind else {
                        rt_bail!("malformed task frame");
                    };
                    let cond = machine.take();
                    if self.truth(cond, "if condition").map_err(|u| u.locate(expr.line()))? {
                        machine.push_eval(&if_expr.then, &env);
                    } else if let Some(elze) = &if_expr.elze {
                        machine.push_eval(elze, &env);
                    } else {
                        machine.value = Some(Value::Void);
                    }
                }
                Frame::Arms { expr, env } => {
                    let ExprKind::Match(m) = &expr.kind else {
                        rt_bail!("malformed task frame");
                    };
                    let scrutinee = machine.take();
                    let (body, arm_env) = self
                        .select_arm(m, &scrutinee, &env)
                        .map_err(|u| u.locate(expr.line()))?;
                    machine.stack.push(Frame::Eval { expr: body, env: arm_env });
                }
                Frame::Logic { expr, env, rhs } => {
                    let ExprKind::BinOp(bin) = &expr.kind else {
                        rt_bail!("malformed task frame");
                    };
                    let operand = machine.take();
                    let operand = self
                        .truth(operand, "logical operand")
                        .map_err(|u| u.locate(expr.line()))?;
                    let decided = rhs
                        || (bin.op == BinOpKind::And && !operand)
                        || (bin.op == BinOpKind::Or && operand);
                    if decided {
                        machine.value = Some(Value::Bool(operand));
                    } else {
                        let rhs_expr = bin.rhs.clone();
                        machine.stack.push(Frame::Logic { expr, env: env.clone(), rhs: true });
                        machine.push_eval(&rhs_expr, &env);
                    }
                }
                Frame::Block { expr, env, next, pending } => {
                    let env = match pending {
                        Pending::Discard => {
                            machine.value = None;
                            env
                        }
                        Pending::Let(index) => {
                            let value = machine.take();
                            let ExprKind::Block(block) = &expr.kind else {
                                rt_bail!("malformed task frame");
                            };
                            let Some(Stmt::Let(stmt)) = block.stmts.get(index) else {
                                rt_bail!("malformed task frame");
                            };
                            self.bind_let(stmt, value, &env)?
                        }
                    };
                    self.block_step(machine, expr, env, next)?;
                }
                Frame::Await { line } => match machine.take() {
                    Value::Future(future) => machine.stack.push(Frame::Resume { future, line }),
                    other => {
                        return Err(runtime_error_at(
                            format!("await expects a Future, found {}", other.type_name()),
                            line,
                        ))
                    }
                },
                Frame::Resume { future, line } => {
                    self.scheduler.futures.mark_observed(future);
                    match self.scheduler.futures.state(future) {
                        Some(FutureState::Resolved(value)) => machine.value = Some(value.clone()),
                        Some(FutureState::Failed(failure)) => {
                            let mut failure = failure.clone();
                            if failure.line == 0 {
                                failure.line = line;
                            }
                            return Ok(TaskStep::Fail(failure));
                        }
                        Some(FutureState::Pending) => {
                            machine.stack.push(Frame::Resume { future, line });
                            return Ok(TaskStep::Suspend(future));
                        }
                        None => return Err(runtime_error_at("unknown future", line)),
                    }
                }
                Frame::Try { line } => {
                    let value = machine.take();
                    machine.value = Some(self.try_unwrap(value, line)?);
                }
            }
        }
        Ok(TaskStep::Complete(machine.take()))
    }

    /// Pushes the frames for an expression that can reach `await`.
    fn begin(&mut self, machine: &mut TaskMachine, expr: PExpr, env: Env) -> EvalResult<()> {
        match &expr.kind {
            ExprKind::Await(await_expr) => {
                let future = await_expr.future.clone();
                machine.stack.push(Frame::Await { line: expr.line() });
                machine.push_eval(&future, &env);
            }
            ExprKind::Try(try_expr) => {
                let inner = try_expr.expr.clone();
                machine.stack.push(Frame::Try { line: expr.line() });
                machine.push_eval(&inner, &env);
            }
            ExprKind::If(if_expr) => {
                let cond = if_expr.cond.clone();
                machine.stack.push(Frame::Branch { expr, env: env.clone() });
                machine.push_eval(&cond, &env);
            }
            ExprKind::Match(m) => {
                let scrutinee = m.scrutinee.clone();
                machine.stack.push(Frame::Arms { expr, env: env.clone() });
                machine.push_eval(&scrutinee, &env);
            }
            ExprKind::BinOp(bin) if bin.op.is_logical() => {
                let lhs = bin.lhs.clone();
                machine.stack.push(Frame::Logic {
                    expr,
                    env: env.clone(),
                    rhs: false,
                });
                machine.push_eval(&lhs, &env);
            }
            ExprKind::Block(_) => self.block_step(machine, expr, env, 0)?,
            _ => {
                let Some(first) = expr.children().first().copied().cloned() else {
                    rt_bail!("expression cannot suspend");
                };
                machine.stack.push(Frame::Strict {
                    expr,
                    env: env.clone(),
                    values: Vec::new(),
                });
                machine.push_eval(&first, &env);
            }
        }
        Ok(())
    }

    /// Schedules statement `next` of a block, or its tail once every
    /// statement ran.
    fn block_step(
        &mut self,
        machine: &mut TaskMachine,
        expr: PExpr,
        env: Env,
        next: usize,
    ) -> EvalResult<()> {
        let ExprKind::Block(block) = &expr.kind else {
            rt_bail!("malformed task frame");
        };
        match block.stmts.get(next) {
            Some(stmt) => {
                let (value, pending) = match stmt {
                    Stmt::Let(let_stmt) => (let_stmt.value.clone(), Pending::Let(next)),
                    Stmt::Expr(expr) => (expr.clone(), Pending::Discard),
                };
                machine.stack.push(Frame::Block {
                    expr: expr.clone(),
                    env: env.clone(),
                    next: next + 1,
                    pending,
                });
                machine.push_eval(&value, &env);
            }
            None => match &block.tail {
                Some(tail) => machine.push_eval(tail, &env),
                None => machine.value = Some(Value::Void),
            },
        }
        Ok(())
    }

    pub(crate) fn run_combinator(&mut self, combinator: &mut Combinator) -> EvalResult<TaskStep> {
        loop {
            let source = match combinator {
                Combinator::OnError { source, .. }
                | Combinator::OnComplete { source, .. }
                | Combinator::Then { source, .. }
                | Combinator::Forward(source) => *source,
                Combinator::All { sources, values } => match sources.get(values.len()) {
                    Some(source) => *source,
                    None => return Ok(TaskStep::Complete(Value::list(std::mem::take(values)))),
                },
            };
            self.scheduler.futures.mark_observed(source);
            let outcome = match self.scheduler.futures.state(source) {
                Some(FutureState::Pending) => return Ok(TaskStep::Suspend(source)),
                Some(FutureState::Resolved(value)) => Ok(value.clone()),
                Some(FutureState::Failed(failure)) => Err(failure.clone()),
                None => rt_bail!("unknown future"),
            };
            let reply = match (&mut *combinator, outcome) {
                (Combinator::Forward(_), Ok(value)) => return Ok(TaskStep::Complete(value)),
                (Combinator::All { values, .. }, Ok(value)) => {
                    values.push(value);
                    continue;
                }
                (Combinator::OnError { handler, .. }, Ok(Value::Result(Err(error)))) => {
                    let handler = handler.clone();
                    self.call_value(handler, vec![(*error).clone()])?
                }
                (Combinator::OnError { handler, .. }, Err(failure)) => {
                    let handler = handler.clone();
                    self.call_value(handler, vec![failure.error])?
                }
                (Combinator::OnError { .. }, Ok(value)) => return Ok(TaskStep::Complete(value)),
                (Combinator::OnComplete { handler, .. }, outcome) => {
                    let argument = match outcome {
                        Ok(result @ Value::Result(_)) => result,
                        Ok(value) => Value::ok(value),
                        Err(failure) => Value::err(failure.error),
                    };
                    let handler = handler.clone();
                    self.call_value(handler, vec![argument])?
                }
                (Combinator::Then { handler, .. }, Ok(value)) => {
                    let handler = handler.clone();
                    self.call_value(handler, vec![value])?
                }
                (_, Err(failure)) => return Ok(TaskStep::Fail(failure)),
            };
            match reply {
                Value::Future(next) => *combinator = Combinator::Forward(next),
                value => return Ok(TaskStep::Complete(value)),
            }
        }
    }
}
