//! Static checking for Rill programs.
//!
//! The checker runs in two passes over every resolved module. The first
//! pass collects record, enum and alias declarations into a
//! [`SchemaTable`]; the second walks every expression, inferring a type for
//! each sub-expression and validating operator operands, record and enum
//! shapes, refinement predicates over constant values, destructuring
//! arity, `match` exhaustiveness and `await` placement. Errors are reported
//! as one batch; evaluation never starts when any exist.

use rill_core::ast::{FunctionId, ItemKind};
use rill_core::diagnostics::{Diagnostic, DiagnosticBag};
use rill_core::module::{ModuleUnit, ResolvedProgram, SymbolKind};
use rill_core::span::Span;
use rill_core::types::{SchemaTable, Ty};
use std::collections::HashMap;
use std::rc::Rc;

pub mod typing;

pub use typing::builtins;
pub use typing::purity::PurityTable;
pub use typing::refine::ConstValue;

use typing::env::{Binding, TypeEnv};

/// What a module-level name refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalSymbol {
    Function { id: FunctionId, is_async: bool },
    Value(Ty),
}

/// Output of a successful check.
#[derive(Debug, Clone)]
pub struct CheckedProgram {
    pub schemas: Rc<SchemaTable>,
    pub purity: PurityTable,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyContext {
    pub allows_await: bool,
    pub in_guard: bool,
}

pub struct TypeChecker {
    pub(crate) schemas: SchemaTable,
    pub(crate) env: TypeEnv,
    pub(crate) diagnostics: DiagnosticBag,
    pub(crate) contexts: Vec<BodyContext>,
    /// Exported bindings of every module checked so far.
    exports: HashMap<String, HashMap<String, (Binding, GlobalSymbol)>>,
    /// Module-level symbols of every module, for the purity analysis.
    pub(crate) unit_globals: HashMap<String, HashMap<String, GlobalSymbol>>,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks `program`, returning every Type Error found.
pub fn check_program(program: &ResolvedProgram) -> Result<CheckedProgram, Vec<Diagnostic>> {
    TypeChecker::new().check(program)
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            schemas: SchemaTable::new(),
            env: TypeEnv::new(),
            diagnostics: DiagnosticBag::new(),
            contexts: Vec::new(),
            exports: HashMap::new(),
            unit_globals: HashMap::new(),
        }
    }

    pub fn check(mut self, program: &ResolvedProgram) -> Result<CheckedProgram, Vec<Diagnostic>> {
        self.collect_schemas(program);
        if !self.diagnostics.has_errors() {
            for unit in &program.units {
                self.check_unit(unit);
            }
        }
        if self.diagnostics.has_errors() {
            let errors = self.diagnostics.errors();
            tracing::debug!("type checking failed with {} error(s)", errors.len());
            return Err(errors);
        }
        let purity = typing::purity::analyze(program, &self.unit_globals);
        let warnings = self.diagnostics.warnings();
        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        Ok(CheckedProgram {
            schemas: Rc::new(self.schemas),
            purity,
            warnings,
        })
    }

    pub(crate) fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::type_error(message, span));
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::warning(message, span));
    }

    pub(crate) fn context(&self) -> BodyContext {
        self.contexts.last().copied().unwrap_or(BodyContext {
            allows_await: true,
            in_guard: false,
        })
    }

    fn check_unit(&mut self, unit: &ModuleUnit) {
        tracing::debug!("checking module '{}'", unit.name);
        self.env = TypeEnv::new();
        self.contexts = vec![BodyContext {
            allows_await: true,
            in_guard: false,
        }];
        let mut globals: HashMap<String, GlobalSymbol> = HashMap::new();

        for import in &unit.imports {
            if matches!(
                import.kind,
                SymbolKind::Record | SymbolKind::Enum | SymbolKind::Alias
            ) {
                continue;
            }
            let (binding, symbol) = self
                .exports
                .get(&import.module)
                .and_then(|exports| exports.get(&import.symbol))
                .cloned()
                .unwrap_or((Binding::of(Ty::Unknown), GlobalSymbol::Value(Ty::Unknown)));
            if !self.env.declare(&import.local, binding) {
                self.error(format!("'{}' is already declared", import.local), import.span);
            }
            globals.insert(import.local.clone(), symbol);
        }

        let program = unit.program.clone();
        for item in &program.items {
            let ItemKind::Function(decl) = &item.kind else {
                continue;
            };
            let Some(name) = decl.name.as_deref() else {
                continue;
            };
            let signature = self.signature(decl);
            if !self.env.declare(name, Binding::of(signature)) {
                self.error(format!("'{name}' is already declared"), decl.span);
            }
            globals.insert(
                name.to_string(),
                GlobalSymbol::Function {
                    id: decl.id,
                    is_async: decl.is_async,
                },
            );
        }

        self.check_alias_predicates(&program);

        for item in &program.items {
            if let ItemKind::Function(decl) = &item.kind {
                let ty = self.check_function(decl);
                if let Some(name) = decl.name.as_deref() {
                    self.env.refine_global(name, Binding::of(ty));
                }
            }
        }

        for item in &program.items {
            match &item.kind {
                ItemKind::Let(stmt) => {
                    self.check_let(stmt);
                    for name in stmt.pattern.bindings() {
                        let ty = self
                            .env
                            .lookup(name)
                            .map(|binding| binding.ty.clone())
                            .unwrap_or(Ty::Unknown);
                        globals.insert(name.to_string(), GlobalSymbol::Value(ty));
                    }
                }
                ItemKind::Expr(expr) => {
                    self.infer_expr(expr);
                }
                _ => {}
            }
        }

        let mut exported = HashMap::new();
        for item in program.items.iter().filter(|item| item.exported) {
            for name in item.declared_names() {
                if let (Some(binding), Some(symbol)) = (self.env.lookup(name), globals.get(name)) {
                    exported.insert(name.to_string(), (binding.clone(), symbol.clone()));
                }
            }
        }
        self.exports.insert(unit.name.clone(), exported);
        self.unit_globals.insert(unit.name.clone(), globals);
    }
}

/// Convenience wrapper reporting failures as a pipeline error.
pub fn check(program: &ResolvedProgram) -> rill_core::Result<CheckedProgram> {
    check_program(program).map_err(rill_core::Error::Type)
}
