use crate::typing::builtins::{self, BuiltinSig};
use crate::{BodyContext, TypeChecker};
use rill_core::ast::{
    Expr, ExprBinOp, ExprInvoke, ExprKind, ExprMatch, ExprMethod, ExprSelect, ExprStruct,
    ExprVariant, ExprWith, FieldInit, Literal, PExpr,
};
use rill_core::ops::{BinOpKind, UnOpKind};
use rill_core::span::Span;
use rill_core::types::Ty;
use std::collections::HashSet;

/// Builtins that drain a stream.
const TERMINAL_OPS: &[&str] = &["collect", "reduce", "chunk", "log", "for_each", "count"];

impl TypeChecker {
    pub(crate) fn infer_expr(&mut self, expr: &Expr) -> Ty {
        match &expr.kind {
            ExprKind::Value(literal) => match literal {
                Literal::Int(_) => Ty::Int,
                Literal::Float(_) => Ty::Float,
                Literal::String(_) => Ty::String,
                Literal::Bool(_) => Ty::Bool,
                Literal::Void => Ty::Void,
            },
            ExprKind::Name(name) => self.infer_name(name),
            ExprKind::List(list) => {
                let elem = self.join_all(&list.items);
                Ty::list(elem)
            }
            ExprKind::Tuple(tuple) => {
                Ty::Tuple(tuple.items.iter().map(|item| self.infer_expr(item)).collect())
            }
            ExprKind::Map(map) => {
                let mut value = None::<Ty>;
                for (_, entry) in &map.entries {
                    let ty = self.infer_expr(entry);
                    value = Some(match value {
                        Some(prev) => prev.join(&ty),
                        None => ty,
                    });
                }
                Ty::Map(Box::new(Ty::String), Box::new(value.unwrap_or(Ty::Unknown)))
            }
            ExprKind::Struct(record) => self.infer_struct(record, expr.span),
            ExprKind::Variant(variant) => self.infer_variant(variant, expr.span),
            ExprKind::With(with) => self.infer_with(with, expr.span),
            ExprKind::Select(select) => self.infer_select(select, expr.span),
            ExprKind::Index(index) => {
                let target = self.infer_expr(&index.target);
                let key = self.infer_expr(&index.index);
                match target.base().clone() {
                    Ty::List(elem) => {
                        self.expect_operand(&key, &Ty::Int, "list index", index.index.span);
                        *elem
                    }
                    Ty::String => {
                        self.expect_operand(&key, &Ty::Int, "string index", index.index.span);
                        Ty::String
                    }
                    Ty::Map(_, value) => {
                        self.expect_operand(&key, &Ty::String, "map key", index.index.span);
                        *value
                    }
                    Ty::Tuple(items) => match self.constant_of(&index.index) {
                        Some(crate::ConstValue::Int(i)) => {
                            match usize::try_from(i).ok().and_then(|i| items.get(i)) {
                                Some(ty) => ty.clone(),
                                None => {
                                    self.error(
                                        format!(
                                            "tuple index {i} out of range for {}",
                                            Ty::Tuple(items.clone())
                                        ),
                                        index.index.span,
                                    );
                                    Ty::Unknown
                                }
                            }
                        }
                        _ => Ty::Unknown,
                    },
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.error(format!("type {other} cannot be indexed"), expr.span);
                        Ty::Unknown
                    }
                }
            }
            ExprKind::Invoke(invoke) => self.infer_invoke(invoke, expr.span),
            ExprKind::Method(method) => self.infer_method(method, expr.span),
            ExprKind::BinOp(bin) => self.infer_binop(bin, expr.span),
            ExprKind::UnOp(un) => {
                let operand = self.infer_expr(&un.operand);
                match un.op {
                    UnOpKind::Not => {
                        self.expect_operand(&operand, &Ty::Bool, "operator `!`", un.operand.span);
                        Ty::Bool
                    }
                    UnOpKind::Neg => {
                        if !operand.maybe_numeric() {
                            self.error(
                                format!("operator `-` expects a number, found {operand}"),
                                un.operand.span,
                            );
                            return Ty::Unknown;
                        }
                        operand.base().clone()
                    }
                }
            }
            ExprKind::If(if_expr) => {
                let cond = self.infer_expr(&if_expr.cond);
                self.expect_operand(&cond, &Ty::Bool, "if condition", if_expr.cond.span);
                let then = self.infer_expr(&if_expr.then);
                match &if_expr.elze {
                    Some(elze) => {
                        let elze = self.infer_expr(elze);
                        then.join(&elze)
                    }
                    None => Ty::Void,
                }
            }
            ExprKind::Match(m) => self.infer_match(m, expr.span),
            ExprKind::Block(block) => self.infer_block(block),
            ExprKind::Closure(decl) => self.check_function(decl),
            ExprKind::Async(async_expr) => {
                self.contexts.push(BodyContext {
                    allows_await: true,
                    in_guard: false,
                });
                let body = self.infer_expr(&async_expr.body);
                self.contexts.pop();
                Ty::future(body)
            }
            ExprKind::Await(await_expr) => {
                let context = self.context();
                if context.in_guard {
                    self.error("await is not allowed in a match guard", expr.span);
                } else if !context.allows_await {
                    self.error(
                        "await is only allowed inside async functions and blocks",
                        expr.span,
                    );
                }
                let future = self.infer_expr(&await_expr.future);
                match future.base().clone() {
                    Ty::Future(inner) => *inner,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.error(format!("await expects a Future, found {other}"), expr.span);
                        Ty::Unknown
                    }
                }
            }
            ExprKind::Try(try_expr) => {
                let inner = self.infer_expr(&try_expr.expr);
                match inner.base().clone() {
                    Ty::Result(ok, _) => *ok,
                    Ty::Option(value) => *value,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.error(
                            format!("`?` expects a Result or Option, found {other}"),
                            expr.span,
                        );
                        Ty::Unknown
                    }
                }
            }
        }
    }

    fn infer_name(&mut self, name: &str) -> Ty {
        if let Some(binding) = self.env.lookup(name) {
            return binding.ty.clone();
        }
        // undefined names surface as runtime errors
        builtins::constant_type(name).unwrap_or(Ty::Unknown)
    }

    fn join_all(&mut self, items: &[PExpr]) -> Ty {
        let mut joined = None::<Ty>;
        for item in items {
            let ty = self.infer_expr(item);
            joined = Some(match joined {
                Some(prev) => prev.join(&ty),
                None => ty,
            });
        }
        joined.unwrap_or(Ty::Unknown)
    }

    pub(crate) fn expect_operand(&mut self, actual: &Ty, expected: &Ty, what: &str, span: Span) {
        if !expected.accepts(actual) {
            self.error(format!("{what} expects {expected}, found {actual}"), span);
        }
    }

    fn infer_fields(&mut self, record: &str, fields: &[FieldInit]) {
        let schema = self.schemas.record(record).cloned();
        for field in fields {
            let actual = self.infer_expr(&field.value);
            let Some(schema) = &schema else {
                continue;
            };
            match schema.field(&field.name) {
                Some(expected) => {
                    let what = format!("field '{}'", field.name);
                    self.expect_type(expected, &actual, &field.value, &what);
                }
                None => self.error(
                    format!("record '{record}' has no field '{}'", field.name),
                    field.span,
                ),
            }
        }
    }

    fn infer_struct(&mut self, record: &ExprStruct, span: Span) -> Ty {
        let Some(schema) = self.schemas.record(&record.name).cloned() else {
            for field in &record.fields {
                self.infer_expr(&field.value);
            }
            self.error(format!("unknown record '{}'", record.name), span);
            return Ty::Unknown;
        };
        let mut seen = HashSet::new();
        for field in &record.fields {
            if !seen.insert(field.name.as_str()) {
                self.error(
                    format!("field '{}' is given more than once", field.name),
                    field.span,
                );
            }
        }
        self.infer_fields(&record.name, &record.fields);
        for (name, _) in &schema.fields {
            if !seen.contains(name.as_str()) {
                self.error(
                    format!("missing field '{name}' in record '{}'", record.name),
                    span,
                );
            }
        }
        Ty::Record(record.name.clone())
    }

    fn infer_variant(&mut self, variant: &ExprVariant, span: Span) -> Ty {
        let args: Vec<Ty> = variant.args.iter().map(|arg| self.infer_expr(arg)).collect();
        let full = format!("{}::{}", variant.enum_name, variant.variant);
        let Some(schema) = self.schemas.enumeration(&variant.enum_name).cloned() else {
            self.error(format!("unknown enum '{}'", variant.enum_name), span);
            return Ty::Unknown;
        };
        let Some(payload) = schema.variant(&variant.variant).cloned() else {
            self.error(
                format!("enum '{}' has no variant '{}'", variant.enum_name, variant.variant),
                span,
            );
            return Ty::Unknown;
        };
        match payload {
            None if !args.is_empty() => {
                self.error(format!("variant '{full}' takes no payload"), span);
            }
            None => {}
            Some(expected) if args.len() == 1 => {
                self.expect_type(
                    &expected,
                    &args[0],
                    &variant.args[0],
                    &format!("payload of '{full}'"),
                );
            }
            Some(Ty::Tuple(items)) if items.len() == args.len() => {
                for ((expected, actual), expr) in items.iter().zip(&args).zip(&variant.args) {
                    self.expect_type(expected, actual, expr, &format!("payload of '{full}'"));
                }
            }
            Some(expected) => {
                let count = match &expected {
                    Ty::Tuple(items) => items.len(),
                    _ => 1,
                };
                self.error(
                    format!(
                        "variant '{full}' expects {count} payload value(s), found {}",
                        args.len()
                    ),
                    span,
                );
            }
        }
        Ty::Enum(variant.enum_name.clone())
    }

    fn infer_with(&mut self, with: &ExprWith, span: Span) -> Ty {
        let target = self.infer_expr(&with.target);
        match target.base().clone() {
            Ty::Record(name) => {
                self.infer_fields(&name, &with.fields);
                target
            }
            Ty::Map(key, value) => {
                let mut value = *value;
                for field in &with.fields {
                    let ty = self.infer_expr(&field.value);
                    value = value.join(&ty);
                }
                Ty::Map(key, Box::new(value))
            }
            Ty::Unknown => {
                for field in &with.fields {
                    self.infer_expr(&field.value);
                }
                Ty::Unknown
            }
            other => {
                self.error(format!("`with` expects a record, found {other}"), span);
                Ty::Unknown
            }
        }
    }

    fn infer_select(&mut self, select: &ExprSelect, span: Span) -> Ty {
        let target = self.infer_expr(&select.target);
        match target.base().clone() {
            Ty::Record(name) => {
                let field = self
                    .schemas
                    .record(&name)
                    .and_then(|schema| schema.field(&select.field))
                    .cloned();
                match field {
                    Some(ty) => ty,
                    None => {
                        self.error(
                            format!("record '{name}' has no field '{}'", select.field),
                            span,
                        );
                        Ty::Unknown
                    }
                }
            }
            Ty::Tuple(items) => match select.field.parse::<usize>() {
                Ok(index) if index < items.len() => items[index].clone(),
                _ => {
                    self.error(
                        format!(
                            "tuple {} has no element '{}'",
                            Ty::Tuple(items.clone()),
                            select.field
                        ),
                        span,
                    );
                    Ty::Unknown
                }
            },
            Ty::Map(_, value) => *value,
            Ty::Unknown => Ty::Unknown,
            other => {
                self.error(format!("type {other} has no field '{}'", select.field), span);
                Ty::Unknown
            }
        }
    }

    fn infer_invoke(&mut self, invoke: &ExprInvoke, span: Span) -> Ty {
        if let Some(name) = invoke.callee.as_name() {
            if self.env.lookup(name).is_none() {
                if let Some(sig) = builtins::lookup(name) {
                    let args: Vec<Ty> =
                        invoke.args.iter().map(|arg| self.infer_expr(arg)).collect();
                    return self.infer_builtin(sig, &args, &invoke.args, span);
                }
            }
        }
        let callee = self.infer_expr(&invoke.callee);
        let args: Vec<Ty> = invoke.args.iter().map(|arg| self.infer_expr(arg)).collect();
        self.apply(&callee, &args, &invoke.args, span)
    }

    fn infer_method(&mut self, method: &ExprMethod, span: Span) -> Ty {
        let receiver = self.infer_expr(&method.receiver);
        let args: Vec<Ty> = method.args.iter().map(|arg| self.infer_expr(arg)).collect();
        if let Ty::Record(name) = receiver.base() {
            let field = self
                .schemas
                .record(name)
                .and_then(|schema| schema.field(&method.method))
                .cloned();
            if let Some(field) = field {
                return self.apply(&field, &args, &method.args, span);
            }
        }
        let mut all_args = Vec::with_capacity(args.len() + 1);
        all_args.push(receiver);
        all_args.extend(args);
        let mut exprs = Vec::with_capacity(method.args.len() + 1);
        exprs.push(method.receiver.clone());
        exprs.extend(method.args.iter().cloned());
        if let Some(binding) = self.env.lookup(&method.method) {
            let callee = binding.ty.clone();
            return self.apply(&callee, &all_args, &exprs, span);
        }
        match builtins::lookup(&method.method) {
            Some(sig) => self.infer_builtin(sig, &all_args, &exprs, span),
            None => Ty::Unknown,
        }
    }

    /// Applies a callee of type `callee`. Fewer arguments than parameters
    /// yields the partially applied function type.
    fn apply(&mut self, callee: &Ty, args: &[Ty], exprs: &[PExpr], span: Span) -> Ty {
        match callee.base() {
            Ty::Function { params, ret } => {
                if args.len() > params.len() {
                    self.error(
                        format!(
                            "function expects {} argument(s), found {}",
                            params.len(),
                            args.len()
                        ),
                        span,
                    );
                    return Ty::Unknown;
                }
                for (index, ((param, arg), expr)) in
                    params.iter().zip(args).zip(exprs).enumerate()
                {
                    self.expect_type(param, arg, expr, &format!("argument {}", index + 1));
                }
                if args.len() < params.len() {
                    Ty::function(params[args.len()..].to_vec(), (**ret).clone())
                } else {
                    (**ret).clone()
                }
            }
            Ty::Unknown => Ty::Unknown,
            other => {
                self.error(format!("value of type {other} is not callable"), span);
                Ty::Unknown
            }
        }
    }

    fn infer_builtin(&mut self, sig: &BuiltinSig, args: &[Ty], exprs: &[PExpr], span: Span) -> Ty {
        if args.len() < sig.min_args && sig.curries() {
            return Ty::function(vec![Ty::Unknown; sig.min_args - args.len()], Ty::Unknown);
        }
        if !sig.accepts_arity(args.len()) {
            let expected = match sig.max_args {
                Some(max) if max == sig.min_args => format!("{max}"),
                Some(max) => format!("{} to {max}", sig.min_args),
                None => format!("at least {}", sig.min_args),
            };
            self.error(
                format!(
                    "'{}' expects {expected} argument(s), found {}",
                    sig.name,
                    args.len()
                ),
                span,
            );
            return Ty::Unknown;
        }
        if sig.sequence {
            if let Some(first) = args.first() {
                if first.element().is_none() {
                    self.error(
                        format!("'{}' expects a List or Stream, found {first}", sig.name),
                        exprs.first().map(|e| e.span).unwrap_or(span),
                    );
                }
            }
        }
        if TERMINAL_OPS.contains(&sig.name) {
            if let Some(source) = exprs.first() {
                if self.is_unbounded(source) {
                    self.warning(
                        format!(
                            "unbounded stream from generate_infinite reaches `{}` without `take`",
                            sig.name
                        ),
                        span,
                    );
                }
            }
        }
        builtins::result_type(sig.name, args)
    }

    /// Whether `expr` is visibly a stream rooted at `generate_infinite`
    /// with no bounding `take` in its pipeline.
    pub(crate) fn is_unbounded(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Name(name) => self.env.lookup(name).is_some_and(|b| b.unbounded),
            ExprKind::Invoke(invoke) => {
                let Some(name) = invoke.callee.as_name() else {
                    return false;
                };
                if self.env.lookup(name).is_some() {
                    return false;
                }
                match name {
                    "generate_infinite" => true,
                    "map" | "filter" | "flat_map" | "skip" => {
                        invoke.args.first().is_some_and(|source| self.is_unbounded(source))
                    }
                    _ => false,
                }
            }
            ExprKind::Method(method) => match method.method.as_str() {
                "map" | "filter" | "flat_map" | "skip" => self.is_unbounded(&method.receiver),
                _ => false,
            },
            _ => false,
        }
    }

    fn infer_binop(&mut self, bin: &ExprBinOp, span: Span) -> Ty {
        let lhs = self.infer_expr(&bin.lhs);
        let rhs = self.infer_expr(&bin.rhs);
        let (l, r) = (lhs.base(), rhs.base());
        let op = bin.op;
        if op.is_logical() {
            self.expect_operand(&lhs, &Ty::Bool, &format!("operator `{op}`"), bin.lhs.span);
            self.expect_operand(&rhs, &Ty::Bool, &format!("operator `{op}`"), bin.rhs.span);
            return Ty::Bool;
        }
        if op.is_equality() {
            return Ty::Bool;
        }
        if op.is_comparison() {
            let comparable = (l.maybe_numeric() && r.maybe_numeric())
                || matches!((l, r), (Ty::String | Ty::Unknown, Ty::String | Ty::Unknown));
            if !comparable {
                self.error(format!("cannot compare {lhs} with {rhs}"), span);
            }
            return Ty::Bool;
        }
        if op == BinOpKind::Add && (matches!(l, Ty::String) || matches!(r, Ty::String)) {
            if matches!((l, r), (Ty::String | Ty::Unknown, Ty::String | Ty::Unknown)) {
                return Ty::String;
            }
            self.error(format!("operator `+` cannot be applied to {lhs} and {rhs}"), span);
            return Ty::Unknown;
        }
        for (ty, operand) in [(&lhs, &bin.lhs), (&rhs, &bin.rhs)] {
            if !ty.maybe_numeric() {
                self.error(
                    format!("arithmetic operator `{op}` expects numbers, found {ty}"),
                    operand.span,
                );
                return Ty::Unknown;
            }
        }
        match (l, r) {
            (Ty::Int, Ty::Int) => Ty::Int,
            (Ty::Float, _) | (_, Ty::Float) => Ty::Float,
            _ => Ty::Unknown,
        }
    }

    fn infer_match(&mut self, m: &ExprMatch, span: Span) -> Ty {
        let scrutinee = self.infer_expr(&m.scrutinee);
        let exhaustive = m
            .arms
            .last()
            .is_some_and(|arm| arm.pattern.is_wildcard() && arm.guard.is_none());
        if !exhaustive {
            self.error("match must end with a wildcard arm `_ =>`", span);
        }
        let mut result = None::<Ty>;
        for arm in &m.arms {
            self.env.enter_scope();
            let mut seen = HashSet::new();
            self.bind_pattern(&arm.pattern, &scrutinee, &mut seen);
            if let Some(guard) = &arm.guard {
                let mut context = self.context();
                context.in_guard = true;
                self.contexts.push(context);
                let ty = self.infer_expr(guard);
                self.contexts.pop();
                self.expect_operand(&ty, &Ty::Bool, "match guard", guard.span);
            }
            let body = self.infer_expr(&arm.body);
            self.env.exit_scope();
            result = Some(match result {
                Some(prev) => prev.join(&body),
                None => body,
            });
        }
        result.unwrap_or(Ty::Unknown)
    }
}
