use super::*;
use rill_core::ast::{FunctionDecl, TypeExpr};
use rill_core::types::Ty;

impl Interpreter {
    /// Applies a function value to arguments.
    pub(crate) fn call_value(&mut self, callee: Value, args: Vec<Value>) -> EvalResult<Value> {
        match callee {
            Value::Function(callable) => self.call_callable(&callable, args),
            other => rt_bail!("value of type {} is not callable", other.type_name()),
        }
    }

    fn call_callable(&mut self, callable: &Rc<Callable>, args: Vec<Value>) -> EvalResult<Value> {
        match &**callable {
            Callable::Partial { target, args: bound } => {
                let mut full = bound.clone();
                full.extend(args);
                self.call_value(target.clone(), full)
            }
            Callable::Builtin(sig) => {
                if args.len() < sig.min_args && sig.curries() {
                    return Ok(partial(callable, args));
                }
                if !sig.accepts_arity(args.len()) {
                    let expected = match sig.max_args {
                        Some(max) if max == sig.min_args => max.to_string(),
                        Some(max) => format!("{} to {max}", sig.min_args),
                        None => format!("at least {}", sig.min_args),
                    };
                    rt_bail!("'{}' expects {expected} argument(s), found {}", sig.name, args.len());
                }
                self.call_builtin(sig, args)
            }
            Callable::Closure(closure) => {
                let arity = closure.decl.arity();
                if args.len() < arity {
                    return Ok(partial(callable, args));
                }
                rt_ensure!(
                    args.len() == arity,
                    "function '{}' expects {arity} argument(s), found {}",
                    closure.decl.display_name(),
                    args.len()
                );
                self.call_closure(closure, args)
            }
        }
    }

    /// Runs a saturated closure call. Async closures spawn their body and
    /// return its future; pure named functions go through the memo cache.
    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> EvalResult<Value> {
        let decl = &closure.decl;
        let memo_key = if self.options.memoize
            && !decl.is_async
            && decl.name.is_some()
            && self.purity.is_pure(decl.id)
        {
            MemoCache::key(decl.id, &args)
        } else {
            None
        };
        if let Some(key) = &memo_key {
            if let Some(value) = self.memo.get(key) {
                tracing::debug!("memo hit for {}", decl.display_name());
                return Ok(value);
            }
        }

        let previous = self.current;
        self.current = closure.module;
        let outcome = self.enter_closure(closure, args);
        self.current = previous;
        let value = outcome?;

        if let Some(key) = memo_key {
            self.memo.insert(key, value.clone());
        }
        Ok(value)
    }

    fn enter_closure(&mut self, closure: &Closure, args: Vec<Value>) -> EvalResult<Value> {
        let decl = &closure.decl;
        let env = closure.env.extend(self.bind_params(decl, args)?);
        if decl.is_async {
            return Ok(Value::Future(self.spawn(decl.body.clone(), env)));
        }
        rt_ensure!(
            self.depth < self.options.max_call_depth,
            "maximum call depth of {} exceeded",
            self.options.max_call_depth
        );
        if let Some(name) = &decl.name {
            self.count_evaluation(name);
        }
        self.depth += 1;
        let result = self.eval(&decl.body, &env);
        self.depth -= 1;
        let value = match result {
            Ok(value) | Err(Unwind::Return { value, .. }) => value,
            Err(err) => return Err(err),
        };
        if let Some(ret) = &decl.ret {
            self.check_annotation(ret, &value, decl.span.line)?;
        }
        Ok(value)
    }

    fn bind_params(
        &mut self,
        decl: &FunctionDecl,
        args: Vec<Value>,
    ) -> EvalResult<Vec<(String, Value)>> {
        let mut bindings = Vec::with_capacity(args.len());
        for (param, value) in decl.params.iter().zip(args) {
            if let Some(ty) = &param.ty {
                let line = if self.line == 0 { param.span.line } else { self.line };
                self.check_annotation(ty, &value, line)?;
            }
            bindings.push((param.name.clone(), value));
        }
        Ok(bindings)
    }

    /// Enforces the refinements implied by a written annotation.
    pub(crate) fn check_annotation(
        &mut self,
        ty: &TypeExpr,
        value: &Value,
        line: u32,
    ) -> EvalResult<()> {
        let ty = self
            .schemas
            .resolve(ty)
            .map_err(|message| runtime_error_at(message, line))?;
        self.check_refinements(&ty, value, line)
    }

    /// Evaluates every refinement predicate of `ty` against `value`,
    /// descending into list, option and tuple elements.
    pub(crate) fn check_refinements(
        &mut self,
        ty: &Ty,
        value: &Value,
        line: u32,
    ) -> EvalResult<()> {
        match (ty, value) {
            (Ty::Refined { alias, base }, _) => {
                let predicate = self
                    .schemas
                    .alias(alias)
                    .and_then(|schema| schema.predicate.clone());
                if let Some(predicate) = predicate {
                    let scope = Env::empty().bind("value", value.clone());
                    let holds = self
                        .eval(&predicate, &scope)
                        .map_err(|unwind| unwind.locate(line))?;
                    if !matches!(holds, Value::Bool(true)) {
                        return Err(runtime_error_at(
                            format!("value {} does not satisfy refinement '{alias}'", value.repr()),
                            line,
                        ));
                    }
                }
                self.check_refinements(base, value, line)
            }
            (Ty::List(elem) | Ty::Set(elem), Value::List(items) | Value::Set(items)) => {
                for item in items.iter() {
                    self.check_refinements(elem, item, line)?;
                }
                Ok(())
            }
            (Ty::Option(inner), Value::Option(Some(item))) => {
                self.check_refinements(inner, item, line)
            }
            (Ty::Tuple(types), Value::Tuple(items)) => {
                for (ty, item) in types.iter().zip(items.iter()) {
                    self.check_refinements(ty, item, line)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn partial(callable: &Rc<Callable>, args: Vec<Value>) -> Value {
    Value::function(Callable::Partial {
        target: Value::Function(callable.clone()),
        args,
    })
}
