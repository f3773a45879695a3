use crate::typing::env::Binding;
use crate::typing::refine::{self, ConstValue};
use crate::{BodyContext, TypeChecker};
use rill_core::ast::{Expr, ExprBlock, FunctionDecl, ItemKind, LetStmt, PatternKind, Program, Stmt};
use rill_core::types::Ty;
use std::collections::HashSet;

impl TypeChecker {
    /// Type of a function before its body is checked. Unannotated parameters
    /// and return types are unknown.
    pub(crate) fn signature(&mut self, decl: &FunctionDecl) -> Ty {
        let params = decl
            .params
            .iter()
            .map(|param| match &param.ty {
                Some(ty) => self.schemas.resolve(ty).unwrap_or(Ty::Unknown),
                None => Ty::Unknown,
            })
            .collect();
        let ret = match &decl.ret {
            Some(ty) => self.schemas.resolve(ty).unwrap_or(Ty::Unknown),
            None => Ty::Unknown,
        };
        Ty::function(params, if decl.is_async { Ty::future(ret) } else { ret })
    }

    pub(crate) fn check_function(&mut self, decl: &FunctionDecl) -> Ty {
        self.contexts.push(BodyContext {
            allows_await: decl.is_async,
            in_guard: false,
        });
        self.env.enter_scope();

        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let ty = match &param.ty {
                Some(ty) => self.resolve_type(ty),
                None => Ty::Unknown,
            };
            if !self.env.declare(&param.name, Binding::of(ty.clone())) {
                self.error(format!("duplicate parameter '{}'", param.name), param.span);
            }
            params.push(ty);
        }

        let body = self.infer_expr(&decl.body);
        let ret = match &decl.ret {
            Some(annotation) => {
                let declared = self.resolve_type(annotation);
                self.expect_type(&declared, &body, &decl.body, "return value");
                declared
            }
            None => body,
        };

        self.env.exit_scope();
        self.contexts.pop();
        Ty::function(params, if decl.is_async { Ty::future(ret) } else { ret })
    }

    pub(crate) fn check_let(&mut self, stmt: &LetStmt) {
        let value = self.infer_expr(&stmt.value);
        let ty = match &stmt.ty {
            Some(annotation) => {
                let declared = self.resolve_type(annotation);
                self.expect_type(&declared, &value, &stmt.value, "let binding");
                declared
            }
            None => value,
        };
        match &stmt.pattern.kind {
            PatternKind::Bind(name) => {
                let binding = Binding {
                    ty,
                    constant: self.constant_of(&stmt.value),
                    unbounded: self.is_unbounded(&stmt.value),
                };
                if !self.env.declare(name, binding) {
                    self.error(
                        format!("'{name}' is already defined in this scope"),
                        stmt.pattern.span,
                    );
                }
            }
            _ => {
                let mut seen = HashSet::new();
                self.bind_pattern(&stmt.pattern, &ty, &mut seen);
            }
        }
    }

    pub(crate) fn infer_block(&mut self, block: &ExprBlock) -> Ty {
        self.env.enter_scope();
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(let_stmt) => self.check_let(let_stmt),
                Stmt::Expr(expr) => {
                    self.infer_expr(expr);
                }
            }
        }
        let ty = match &block.tail {
            Some(tail) => self.infer_expr(tail),
            None => Ty::Void,
        };
        self.env.exit_scope();
        ty
    }

    /// Refinement predicates are Bool expressions over `value`.
    pub(crate) fn check_alias_predicates(&mut self, program: &Program) {
        for item in &program.items {
            let ItemKind::Alias(decl) = &item.kind else {
                continue;
            };
            let Some(predicate) = &decl.predicate else {
                continue;
            };
            let base = self
                .schemas
                .alias(&decl.name)
                .map(|alias| alias.base.clone())
                .unwrap_or(Ty::Unknown);
            self.contexts.push(BodyContext {
                allows_await: false,
                in_guard: false,
            });
            self.env.enter_scope();
            self.env.declare("value", Binding::of(base));
            let ty = self.infer_expr(predicate);
            self.env.exit_scope();
            self.contexts.pop();
            if !Ty::Bool.accepts(&ty) {
                self.error(
                    format!("refinement predicate of '{}' must be Bool, found {ty}", decl.name),
                    predicate.span,
                );
            }
        }
    }

    /// Reports a mismatch between a declared type and an inferred one, then
    /// decides refinement predicates when `expr` folds to a constant.
    pub(crate) fn expect_type(&mut self, expected: &Ty, actual: &Ty, expr: &Expr, what: &str) {
        if !expected.accepts(actual) {
            self.error(
                format!("{what}: expected {expected}, found {actual}"),
                expr.span,
            );
            return;
        }
        let refinements: Vec<_> = self
            .schemas
            .refinements(expected)
            .into_iter()
            .cloned()
            .collect();
        if refinements.is_empty() {
            return;
        }
        let Some(constant) = self.constant_of(expr) else {
            return;
        };
        for alias in refinements {
            let scope = |name: &str| self.global_constant(name);
            if refine::refinement_holds(&alias, &constant, &scope) == Some(false) {
                self.error(
                    format!("value {constant} does not satisfy refinement '{}'", alias.name),
                    expr.span,
                );
            }
        }
    }

    pub(crate) fn constant_of(&self, expr: &Expr) -> Option<ConstValue> {
        let scope = |name: &str| self.env.lookup(name).and_then(|b| b.constant.clone());
        refine::fold(expr, &scope)
    }

    fn global_constant(&self, name: &str) -> Option<ConstValue> {
        if self.env.is_global(name) {
            self.env.lookup(name).and_then(|b| b.constant.clone())
        } else {
            None
        }
    }
}
