//! Decides which named functions may be memoized.
//!
//! A function is pure when its body (including lambdas written inside it)
//! uses no effectful builtin, no `async`/`await`, and refers only to pure
//! functions and module-level data. `log` is allowed.

use crate::typing::builtins::{self, Effect};
use crate::GlobalSymbol;
use rill_core::ast::{Expr, ExprKind, FunctionDecl, FunctionId, ItemKind, Stmt};
use rill_core::module::ResolvedProgram;
use rill_core::types::Ty;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct PurityTable {
    pure: HashSet<FunctionId>,
}

impl PurityTable {
    pub fn is_pure(&self, id: FunctionId) -> bool {
        self.pure.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.pure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pure.is_empty()
    }
}

struct Summary {
    calls: HashSet<FunctionId>,
    effectful: bool,
}

struct Scan<'a> {
    globals: &'a HashMap<String, GlobalSymbol>,
    locals: HashSet<&'a str>,
    summary: Summary,
}

impl<'a> Scan<'a> {
    fn function(&mut self, decl: &'a FunctionDecl) {
        if decl.is_async {
            self.summary.effectful = true;
        }
        self.locals.extend(decl.params.iter().map(|p| p.name.as_str()));
        self.expr(&decl.body);
    }

    fn expr(&mut self, expr: &'a Expr) {
        if self.summary.effectful {
            return;
        }
        match &expr.kind {
            ExprKind::Await(_) | ExprKind::Async(_) => {
                self.summary.effectful = true;
                return;
            }
            ExprKind::Name(name) => self.name(name),
            ExprKind::Closure(decl) => self.function(decl),
            ExprKind::Method(method) => {
                if !self.locals.contains(method.method.as_str()) {
                    self.name(&method.method);
                }
            }
            ExprKind::Match(m) => {
                for arm in &m.arms {
                    self.locals.extend(arm.pattern.bindings());
                }
            }
            ExprKind::Block(block) => {
                for stmt in &block.stmts {
                    if let Stmt::Let(let_stmt) = stmt {
                        self.locals.extend(let_stmt.pattern.bindings());
                    }
                }
            }
            _ => {}
        }
        for child in expr.children() {
            self.expr(child);
        }
    }

    fn name(&mut self, name: &str) {
        if self.locals.contains(name) {
            return;
        }
        match self.globals.get(name) {
            Some(GlobalSymbol::Function { id, is_async }) => {
                if *is_async {
                    self.summary.effectful = true;
                } else {
                    self.summary.calls.insert(*id);
                }
            }
            Some(GlobalSymbol::Value(ty)) => {
                if matches!(
                    ty.base(),
                    Ty::Function { .. } | Ty::Unknown | Ty::Future(_) | Ty::Stream(_)
                ) {
                    self.summary.effectful = true;
                }
            }
            None => match builtins::lookup(name) {
                Some(sig) => {
                    if matches!(sig.effect, Effect::Async | Effect::Gateway) {
                        self.summary.effectful = true;
                    }
                }
                None if builtins::constant_type(name).is_some() => {}
                None => self.summary.effectful = true,
            },
        }
    }
}

/// Computes the set of memoizable functions across every module.
pub fn analyze(
    program: &ResolvedProgram,
    unit_globals: &HashMap<String, HashMap<String, GlobalSymbol>>,
) -> PurityTable {
    let empty = HashMap::new();
    let mut summaries: HashMap<FunctionId, Summary> = HashMap::new();
    for unit in &program.units {
        let globals = unit_globals.get(&unit.name).unwrap_or(&empty);
        for item in &unit.program.items {
            let ItemKind::Function(decl) = &item.kind else {
                continue;
            };
            if decl.name.is_none() {
                continue;
            }
            let mut scan = Scan {
                globals,
                locals: HashSet::new(),
                summary: Summary {
                    calls: HashSet::new(),
                    effectful: false,
                },
            };
            scan.function(decl);
            summaries.insert(decl.id, scan.summary);
        }
    }

    let mut pure: HashSet<FunctionId> = summaries
        .iter()
        .filter(|(_, summary)| !summary.effectful)
        .map(|(id, _)| *id)
        .collect();
    loop {
        let tainted: Vec<FunctionId> = pure
            .iter()
            .filter(|id| {
                summaries
                    .get(id)
                    .is_some_and(|s| s.calls.iter().any(|callee| !pure.contains(callee)))
            })
            .copied()
            .collect();
        if tainted.is_empty() {
            break;
        }
        for id in tainted {
            pure.remove(&id);
        }
    }
    tracing::debug!("{} of {} function(s) are memoizable", pure.len(), summaries.len());
    PurityTable { pure }
}
