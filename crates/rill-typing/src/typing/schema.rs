use crate::TypeChecker;
use rill_core::ast::{AliasDecl, EnumDecl, ItemKind, RecordDecl, TypeExpr};
use rill_core::module::ResolvedProgram;
use rill_core::types::{AliasSchema, EnumSchema, RecordSchema, Ty};
use std::collections::HashSet;

impl TypeChecker {
    /// First pass: registers every declared type name, then resolves the
    /// shapes behind them. Aliases resolve before records and enums so that
    /// field types can name refinements.
    pub(crate) fn collect_schemas(&mut self, program: &ResolvedProgram) {
        let mut records = Vec::new();
        let mut enums = Vec::new();
        let mut aliases = Vec::new();
        for unit in &program.units {
            for item in &unit.program.items {
                let name = match &item.kind {
                    ItemKind::Record(decl) => {
                        records.push(decl.clone());
                        &decl.name
                    }
                    ItemKind::Enum(decl) => {
                        enums.push(decl.clone());
                        &decl.name
                    }
                    ItemKind::Alias(decl) => {
                        aliases.push(decl.clone());
                        &decl.name
                    }
                    _ => continue,
                };
                if self.schemas.is_type_name(name) {
                    self.error(format!("type '{name}' is already declared"), item.span);
                    continue;
                }
                self.register(&item.kind);
            }
        }

        // two rounds let an alias refer to one declared after it
        for _ in 0..2 {
            for decl in &aliases {
                self.resolve_alias(decl, false);
            }
        }
        for decl in &aliases {
            self.resolve_alias(decl, true);
        }
        for decl in &records {
            self.resolve_record(decl);
        }
        for decl in &enums {
            self.resolve_enum(decl);
        }
        tracing::debug!(
            "collected {} record(s), {} enum(s), {} alias(es)",
            records.len(),
            enums.len(),
            aliases.len()
        );
    }

    fn register(&mut self, kind: &ItemKind) {
        match kind {
            ItemKind::Record(decl) => {
                self.schemas.records.insert(
                    decl.name.clone(),
                    RecordSchema {
                        name: decl.name.clone(),
                        fields: Vec::new(),
                    },
                );
            }
            ItemKind::Enum(decl) => {
                self.schemas.enums.insert(
                    decl.name.clone(),
                    EnumSchema {
                        name: decl.name.clone(),
                        variants: Vec::new(),
                    },
                );
            }
            ItemKind::Alias(decl) => {
                self.schemas.aliases.insert(
                    decl.name.clone(),
                    AliasSchema {
                        name: decl.name.clone(),
                        base: Ty::Unknown,
                        predicate: decl.predicate.clone(),
                    },
                );
            }
            _ => {}
        }
    }

    /// Resolves an annotation, reporting unknown names at the annotation.
    pub(crate) fn resolve_type(&mut self, ty: &TypeExpr) -> Ty {
        match self.schemas.resolve(ty) {
            Ok(ty) => ty,
            Err(message) => {
                self.error(message, ty.span());
                Ty::Unknown
            }
        }
    }

    fn resolve_alias(&mut self, decl: &AliasDecl, report: bool) {
        let base = if report {
            self.resolve_type(&decl.ty)
        } else {
            self.schemas.resolve(&decl.ty).unwrap_or(Ty::Unknown)
        };
        if let Some(schema) = self.schemas.aliases.get_mut(&decl.name) {
            schema.base = base;
        }
    }

    fn resolve_record(&mut self, decl: &RecordDecl) {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            if !seen.insert(field.name.as_str()) {
                self.error(
                    format!("duplicate field '{}' in record '{}'", field.name, decl.name),
                    field.span,
                );
                continue;
            }
            let ty = self.resolve_type(&field.ty);
            fields.push((field.name.clone(), ty));
        }
        if let Some(schema) = self.schemas.records.get_mut(&decl.name) {
            schema.fields = fields;
        }
    }

    fn resolve_enum(&mut self, decl: &EnumDecl) {
        let mut seen = HashSet::new();
        let mut variants = Vec::with_capacity(decl.variants.len());
        for variant in &decl.variants {
            if !seen.insert(variant.name.as_str()) {
                self.error(
                    format!("duplicate variant '{}' in enum '{}'", variant.name, decl.name),
                    variant.span,
                );
                continue;
            }
            let mut payload: Vec<Ty> = variant
                .payload
                .iter()
                .map(|ty| self.resolve_type(ty))
                .collect();
            let payload = match payload.len() {
                0 => None,
                1 => payload.pop(),
                _ => Some(Ty::Tuple(payload)),
            };
            variants.push((variant.name.clone(), payload));
        }
        if let Some(schema) = self.schemas.enums.get_mut(&decl.name) {
            schema.variants = variants;
        }
    }
}
