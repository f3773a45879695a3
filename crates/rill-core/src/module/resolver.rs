use crate::ast::{ItemKind, Program};
use crate::diagnostics::Diagnostic;
use crate::module::ModuleProvider;
use crate::span::Span;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ResolverError {
    #[error("module '{0}' not found")]
    ModuleNotFound(String),
    #[error("module '{module}' has no symbol '{symbol}'")]
    SymbolNotFound { module: String, symbol: String },
    #[error("symbol '{symbol}' is not exported by module '{module}'")]
    NotExported { module: String, symbol: String },
    #[error("cyclic import of module '{0}'")]
    Cycle(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Record,
    Enum,
    Alias,
    Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImport {
    /// Name the symbol is bound to in the importing module.
    pub local: String,
    pub module: String,
    pub symbol: String,
    pub kind: SymbolKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ModuleUnit {
    pub name: String,
    pub program: Rc<Program>,
    pub imports: Vec<ResolvedImport>,
}

/// Modules reachable from the entry module, dependencies first and the
/// entry module last.
#[derive(Debug, Clone)]
pub struct ResolvedProgram {
    pub units: Vec<ModuleUnit>,
}

impl ResolvedProgram {
    /// A program with no imports.
    pub fn single(name: impl Into<String>, program: Rc<Program>) -> Self {
        Self {
            units: vec![ModuleUnit {
                name: name.into(),
                program,
                imports: Vec::new(),
            }],
        }
    }

    pub fn main(&self) -> Option<&ModuleUnit> {
        self.units.last()
    }

    pub fn unit(&self, name: &str) -> Option<&ModuleUnit> {
        self.units.iter().find(|unit| unit.name == name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

struct ModuleResolver<'a, P: ModuleProvider + ?Sized> {
    provider: &'a P,
    state: HashMap<String, Visit>,
    units: Vec<ModuleUnit>,
    errors: Vec<Diagnostic>,
}

/// Binds every `import` of `main` and its transitive dependencies to an
/// exported declaration. All problems are reported together as Type Errors
/// located at the offending import.
pub fn resolve_modules<P: ModuleProvider + ?Sized>(
    main_name: &str,
    main: Rc<Program>,
    provider: &P,
) -> Result<ResolvedProgram, Vec<Diagnostic>> {
    let mut resolver = ModuleResolver {
        provider,
        state: HashMap::new(),
        units: Vec::new(),
        errors: Vec::new(),
    };
    resolver.visit(main_name, main);
    if resolver.errors.is_empty() {
        Ok(ResolvedProgram {
            units: resolver.units,
        })
    } else {
        Err(resolver.errors)
    }
}

impl<P: ModuleProvider + ?Sized> ModuleResolver<'_, P> {
    fn visit(&mut self, name: &str, program: Rc<Program>) {
        self.state.insert(name.to_string(), Visit::InProgress);
        let mut imports = Vec::new();
        for (decl, span) in program.imports() {
            let Some(target) = self.provider.module(&decl.module) else {
                self.report(ResolverError::ModuleNotFound(decl.module.clone()), span);
                continue;
            };
            match self.state.get(decl.module.as_str()) {
                Some(Visit::InProgress) => {
                    self.report(ResolverError::Cycle(decl.module.clone()), span);
                    continue;
                }
                Some(Visit::Done) => {}
                None => {
                    crate::debug!("resolving module '{}' imported by '{}'", decl.module, name);
                    self.visit(&decl.module, target.clone());
                }
            }
            for import in &decl.names {
                match lookup_export(&decl.module, &target, &import.name) {
                    Ok(kind) => imports.push(ResolvedImport {
                        local: import.local().to_string(),
                        module: decl.module.clone(),
                        symbol: import.name.clone(),
                        kind,
                        span: import.span,
                    }),
                    Err(err) => self.report(err, import.span),
                }
            }
        }
        self.state.insert(name.to_string(), Visit::Done);
        self.units.push(ModuleUnit {
            name: name.to_string(),
            program,
            imports,
        });
    }

    fn report(&mut self, err: ResolverError, span: Span) {
        self.errors.push(Diagnostic::type_error(err.to_string(), span));
    }
}

fn lookup_export(
    module: &str,
    program: &Program,
    symbol: &str,
) -> Result<SymbolKind, ResolverError> {
    if let Some(item) = program.find_export(symbol) {
        return Ok(match &item.kind {
            ItemKind::Function(_) => SymbolKind::Function,
            ItemKind::Record(_) => SymbolKind::Record,
            ItemKind::Enum(_) => SymbolKind::Enum,
            ItemKind::Alias(_) => SymbolKind::Alias,
            _ => SymbolKind::Value,
        });
    }
    if program.declares(symbol) {
        Err(ResolverError::NotExported {
            module: module.to_string(),
            symbol: symbol.to_string(),
        })
    } else {
        Err(ResolverError::SymbolNotFound {
            module: module.to_string(),
            symbol: symbol.to_string(),
        })
    }
}
