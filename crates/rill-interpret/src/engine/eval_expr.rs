use super::*;
use crate::value::{EnumValue, RecordValue};
use rill_core::ast::{Expr, ExprBlock, ExprKind, ExprMatch, FieldInit, LetStmt, Literal, Stmt};
use rill_core::ops::BinOpKind;

/// Remaining native stack below which evaluation moves to a fresh segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

pub(super) fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(v) => Value::Int(*v),
        Literal::Float(v) => Value::Float(*v),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Void => Value::Void,
    }
}

impl Interpreter {
    /// Evaluates an expression that does not suspend. Failures raised
    /// without a line are attributed to `expr`.
    pub(crate) fn eval(&mut self, expr: &PExpr, env: &Env) -> EvalResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_inner(expr, env).map_err(|unwind| unwind.locate(expr.line()))
        })
    }

    fn eval_inner(&mut self, expr: &PExpr, env: &Env) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Value(literal) => Ok(literal_value(literal)),
            ExprKind::Name(name) => self.lookup(name, env),
            ExprKind::If(if_expr) => {
                let cond = self.eval(&if_expr.cond, env)?;
                if self.truth(cond, "if condition")? {
                    self.eval(&if_expr.then, env)
                } else {
                    match &if_expr.elze {
                        Some(elze) => self.eval(elze, env),
                        None => Ok(Value::Void),
                    }
                }
            }
            ExprKind::Match(m) => {
                let scrutinee = self.eval(&m.scrutinee, env)?;
                let (body, arm_env) = self.select_arm(m, &scrutinee, env)?;
                self.eval(&body, &arm_env)
            }
            ExprKind::Block(block) => self.eval_block(block, env),
            ExprKind::Closure(decl) => Ok(Value::function(Callable::Closure(Closure {
                decl: decl.clone(),
                env: env.clone(),
                module: self.current,
            }))),
            ExprKind::Async(async_expr) => {
                Ok(Value::Future(self.spawn(async_expr.body.clone(), env.clone())))
            }
            ExprKind::Await(await_expr) => {
                // Only reachable for futures that already settled.
                let future = self.eval(&await_expr.future, env)?;
                let Value::Future(id) = future else {
                    rt_bail!("await expects a Future, found {}", future.type_name());
                };
                match self.await_future(id, expr.line())? {
                    Some(value) => Ok(value),
                    None => rt_bail!("await on a pending future outside an async task"),
                }
            }
            ExprKind::Try(try_expr) => {
                let value = self.eval(&try_expr.expr, env)?;
                self.try_unwrap(value, expr.line())
            }
            ExprKind::BinOp(bin) if bin.op.is_logical() => {
                let lhs = self.eval(&bin.lhs, env)?;
                let lhs = self.truth(lhs, "logical operand")?;
                match (bin.op, lhs) {
                    (BinOpKind::And, false) => Ok(Value::Bool(false)),
                    (BinOpKind::Or, true) => Ok(Value::Bool(true)),
                    _ => {
                        let rhs = self.eval(&bin.rhs, env)?;
                        Ok(Value::Bool(self.truth(rhs, "logical operand")?))
                    }
                }
            }
            _ => {
                let mut values = Vec::new();
                for child in expr.children() {
                    values.push(self.eval(child, env)?);
                }
                self.combine(expr, env, values)
            }
        }
    }

    /// Finishes a node whose sub-expressions were all evaluated, in
    /// `Expr::children` order, into `values`.
    pub(crate) fn combine(
        &mut self,
        expr: &Expr,
        env: &Env,
        values: Vec<Value>,
    ) -> EvalResult<Value> {
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or(Value::Void);
        match &expr.kind {
            ExprKind::List(list) => {
                Ok(Value::list((0..list.items.len()).map(|_| next()).collect()))
            }
            ExprKind::Tuple(tuple) => {
                Ok(Value::tuple((0..tuple.items.len()).map(|_| next()).collect()))
            }
            ExprKind::Map(map) => Ok(Value::map(
                map.entries.iter().map(|(key, _)| (key.clone(), next())).collect(),
            )),
            ExprKind::Struct(st) => {
                let fields = st.fields.iter().map(|f| (f, next())).collect::<Vec<_>>();
                self.build_record(&st.name, fields)
            }
            ExprKind::Variant(variant) => {
                let mut payload: Vec<Value> = (0..variant.args.len()).map(|_| next()).collect();
                let payload = match payload.len() {
                    0 => None,
                    1 => payload.pop(),
                    _ => Some(Value::tuple(payload)),
                };
                self.build_variant(&variant.enum_name, &variant.variant, payload)
            }
            ExprKind::With(with) => {
                let target = next();
                let updates = with.fields.iter().map(|f| (f, next())).collect::<Vec<_>>();
                self.apply_with(target, updates)
            }
            ExprKind::Select(select) => select_field(next(), &select.field),
            ExprKind::Index(_) => {
                let target = next();
                index_value(target, next())
            }
            ExprKind::Invoke(invoke) => {
                let callee = next();
                let args = (0..invoke.args.len()).map(|_| next()).collect();
                self.line = expr.line();
                self.call_value(callee, args)
            }
            ExprKind::Method(method) => {
                let receiver = next();
                let args = (0..method.args.len()).map(|_| next()).collect();
                self.line = expr.line();
                self.call_method(&method.method, receiver, args, env)
            }
            ExprKind::BinOp(bin) => {
                let lhs = next();
                self.evaluate_binop(bin.op, lhs, next())
            }
            ExprKind::UnOp(un) => self.evaluate_unop(un.op, next()),
            _ => rt_bail!("expression cannot be evaluated from its parts"),
        }
    }

    pub(crate) fn eval_block(&mut self, block: &ExprBlock, env: &Env) -> EvalResult<Value> {
        let mut scope = env.clone();
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(let_stmt) => {
                    let value = self.eval(&let_stmt.value, &scope)?;
                    scope = self.bind_let(let_stmt, value, &scope)?;
                }
                Stmt::Expr(expr) => {
                    self.eval(expr, &scope)?;
                }
            }
        }
        match &block.tail {
            Some(tail) => self.eval(tail, &scope),
            None => Ok(Value::Void),
        }
    }

    /// Checks the annotation of a `let`, destructures the value and pushes
    /// a frame with the new bindings.
    pub(crate) fn bind_let(&mut self, stmt: &LetStmt, value: Value, env: &Env) -> EvalResult<Env> {
        let line = stmt.span.line;
        if let Some(ty) = &stmt.ty {
            self.check_annotation(ty, &value, line)?;
        }
        let bindings = self
            .destructure(&stmt.pattern, &value)
            .map_err(|unwind| unwind.locate(line))?;
        Ok(env.extend(bindings))
    }

    /// First arm, in source order, whose pattern matches and whose guard
    /// holds. Returns its body and the arm's environment.
    pub(crate) fn select_arm(
        &mut self,
        m: &ExprMatch,
        scrutinee: &Value,
        env: &Env,
    ) -> EvalResult<(PExpr, Env)> {
        if let Value::Future(id) = scrutinee {
            self.scheduler.futures.mark_observed(*id);
        }
        for arm in &m.arms {
            let Some(bindings) = match_pattern(&arm.pattern, scrutinee, &self.scheduler.futures)
            else {
                continue;
            };
            let arm_env = env.extend(bindings);
            if let Some(guard) = &arm.guard {
                let passed = self.eval(guard, &arm_env)?;
                if !self.truth(passed, "match guard")? {
                    continue;
                }
            }
            return Ok((arm.body.clone(), arm_env));
        }
        rt_bail!("no match arm accepts {}", scrutinee.repr())
    }

    pub(crate) fn truth(&self, value: Value, what: &str) -> EvalResult<bool> {
        match value {
            Value::Bool(b) => Ok(b),
            other => rt_bail!("{what} must be Bool, found {}", other.type_name()),
        }
    }

    /// `expr?`: unwraps `Ok`/`Some`, otherwise leaves the enclosing
    /// function with the `Err`/`None`.
    pub(crate) fn try_unwrap(&self, value: Value, line: u32) -> EvalResult<Value> {
        match value {
            Value::Result(Ok(inner)) | Value::Option(Some(inner)) => Ok((*inner).clone()),
            failure @ (Value::Result(Err(_)) | Value::Option(None)) => {
                Err(Unwind::Return { value: failure, line })
            }
            other => rt_bail!("`?` expects a Result or Option, found {}", other.type_name()),
        }
    }

    fn build_record(&mut self, name: &str, fields: Vec<(&FieldInit, Value)>) -> EvalResult<Value> {
        let schemas = self.schemas.clone();
        let Some(schema) = schemas.record(name) else {
            rt_bail!("unknown record '{name}'");
        };
        let mut ordered = Vec::with_capacity(schema.fields.len());
        for (field, ty) in &schema.fields {
            let Some((init, value)) = fields.iter().find(|(init, _)| &init.name == field) else {
                rt_bail!("missing field '{field}' in record '{name}'");
            };
            self.check_refinements(ty, value, init.span.line)?;
            ordered.push((field.clone(), value.clone()));
        }
        if let Some((init, _)) = fields
            .iter()
            .find(|(init, _)| schema.field(&init.name).is_none())
        {
            rt_bail!("record '{name}' has no field '{}'", init.name);
        }
        Ok(Value::Record(Rc::new(RecordValue {
            name: name.to_string(),
            fields: ordered,
        })))
    }

    fn build_variant(
        &self,
        enum_name: &str,
        variant: &str,
        payload: Option<Value>,
    ) -> EvalResult<Value> {
        let known = self
            .schemas
            .enumeration(enum_name)
            .is_some_and(|schema| schema.variant(variant).is_some());
        rt_ensure!(known, "enum '{enum_name}' has no variant '{variant}'");
        Ok(Value::Enum(Rc::new(EnumValue {
            enum_name: enum_name.to_string(),
            variant: variant.to_string(),
            payload,
        })))
    }

    /// `target with { .. }`: a copy with the named fields replaced.
    fn apply_with(
        &mut self,
        target: Value,
        updates: Vec<(&FieldInit, Value)>,
    ) -> EvalResult<Value> {
        match target {
            Value::Record(record) => {
                let schemas = self.schemas.clone();
                let mut fields = record.fields.clone();
                for (init, value) in updates {
                    let Some(slot) = fields.iter_mut().find(|(name, _)| name == &init.name) else {
                        rt_bail!("record '{}' has no field '{}'", record.name, init.name);
                    };
                    if let Some(ty) = schemas
                        .record(&record.name)
                        .and_then(|s| s.field(&init.name))
                    {
                        self.check_refinements(ty, &value, init.span.line)?;
                    }
                    slot.1 = value;
                }
                Ok(Value::Record(Rc::new(RecordValue {
                    name: record.name.clone(),
                    fields,
                })))
            }
            Value::Map(map) => {
                let mut entries = (*map).clone();
                for (init, value) in updates {
                    entries.insert(init.name.clone(), value);
                }
                Ok(Value::map(entries))
            }
            other => rt_bail!("`with` expects a record, found {}", other.type_name()),
        }
    }

    /// `receiver.method(args)`: a function stored in a record field wins,
    /// otherwise `method(receiver, args)`.
    fn call_method(
        &mut self,
        method: &str,
        receiver: Value,
        args: Vec<Value>,
        env: &Env,
    ) -> EvalResult<Value> {
        if let Value::Record(record) = &receiver {
            if let Some(field @ Value::Function(_)) = record.field(method) {
                return self.call_value(field.clone(), args);
            }
        }
        let callee = self.lookup(method, env)?;
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(receiver);
        full.extend(args);
        self.call_value(callee, full)
    }
}

fn select_field(target: Value, field: &str) -> EvalResult<Value> {
    match &target {
        Value::Record(record) => match record.field(field) {
            Some(value) => Ok(value.clone()),
            None => rt_bail!("record '{}' has no field '{field}'", record.name),
        },
        Value::Map(map) => match map.get(field) {
            Some(value) => Ok(value.clone()),
            None => rt_bail!("key '{field}' not found"),
        },
        Value::Tuple(items) => match field.parse::<usize>().ok().and_then(|i| items.get(i)) {
            Some(value) => Ok(value.clone()),
            None => rt_bail!("tuple of length {} has no element '{field}'", items.len()),
        },
        other => rt_bail!("value of type {} has no field '{field}'", other.type_name()),
    }
}

fn index_value(target: Value, index: Value) -> EvalResult<Value> {
    match (&target, &index) {
        (Value::List(items) | Value::Tuple(items), Value::Int(i)) => {
            let found = usize::try_from(*i).ok().and_then(|i| items.get(i));
            match found {
                Some(value) => Ok(value.clone()),
                None => rt_bail!(
                    "index {i} out of bounds for {} of length {}",
                    target.type_name(),
                    items.len()
                ),
            }
        }
        (Value::String(s), Value::Int(i)) => {
            let found = usize::try_from(*i).ok().and_then(|i| s.chars().nth(i));
            match found {
                Some(c) => Ok(Value::string(c.to_string())),
                None => rt_bail!(
                    "index {i} out of bounds for string of length {}",
                    s.chars().count()
                ),
            }
        }
        (Value::Map(map), Value::String(key)) => match map.get(&**key) {
            Some(value) => Ok(value.clone()),
            None => rt_bail!("key '{key}' not found"),
        },
        _ => rt_bail!("cannot index {} with {}", target.type_name(), index.type_name()),
    }
}
