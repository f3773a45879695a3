use rill_core::ast::{
    Expr, FunctionDecl, FunctionId, ImportDecl, ImportName, Item, ItemKind, Literal, Program,
    RecordDecl,
};
use rill_core::diagnostics::DiagnosticKind;
use rill_core::module::{resolve_modules, ModuleMap, SymbolKind};
use rill_core::span::Span;
use std::rc::Rc;

fn at(line: u32) -> Span {
    Span::new(0, 0, line, 1)
}

fn function(name: &str, exported: bool) -> Item {
    let decl = FunctionDecl {
        id: FunctionId::fresh(),
        name: Some(name.to_string()),
        params: Vec::new(),
        ret: None,
        body: Expr::new(Literal::Int(1), Span::null()).into_ptr(),
        is_async: false,
        span: Span::null(),
    };
    Item {
        kind: ItemKind::Function(Rc::new(decl)),
        exported,
        span: Span::null(),
    }
}

fn record(name: &str) -> Item {
    Item {
        kind: ItemKind::Record(RecordDecl {
            name: name.to_string(),
            fields: Vec::new(),
        }),
        exported: true,
        span: Span::null(),
    }
}

fn import(module: &str, names: &[(&str, Option<&str>)], line: u32) -> Item {
    Item {
        kind: ItemKind::Import(ImportDecl {
            names: names
                .iter()
                .map(|(name, alias)| ImportName {
                    name: name.to_string(),
                    alias: alias.map(str::to_string),
                    span: at(line),
                })
                .collect(),
            module: module.to_string(),
        }),
        exported: false,
        span: at(line),
    }
}

#[test]
fn dependencies_come_before_importers() {
    let modules = ModuleMap::new()
        .with_module("geometry", Program::new(vec![record("Point"), function("area", true)]))
        .with_module(
            "shapes",
            Program::new(vec![
                import("geometry", &[("Point", None)], 1),
                function("square", true),
            ]),
        );
    let main = Program::new(vec![
        import("shapes", &[("square", Some("sq"))], 1),
        import("geometry", &[("area", None)], 2),
    ]);

    let resolved = resolve_modules("main", Rc::new(main), &modules).expect("resolves");
    let order: Vec<&str> = resolved.units.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(order, vec!["geometry", "shapes", "main"]);

    let main = resolved.main().expect("main unit");
    assert_eq!(main.imports[0].local, "sq");
    assert_eq!(main.imports[0].symbol, "square");
    assert_eq!(main.imports[0].kind, SymbolKind::Function);
    let shapes = resolved.unit("shapes").expect("shapes unit");
    assert_eq!(shapes.imports[0].kind, SymbolKind::Record);
}

#[test]
fn missing_module_and_private_symbol_are_reported_together() {
    let modules =
        ModuleMap::new().with_module("util", Program::new(vec![function("helper", false)]));
    let main = Program::new(vec![
        import("nowhere", &[("thing", None)], 1),
        import("util", &[("helper", None), ("ghost", None)], 2),
    ]);

    let errors = resolve_modules("main", Rc::new(main), &modules).expect_err("must fail");
    let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "Type Error (Line 1, Position 1): module 'nowhere' not found",
            "Type Error (Line 2, Position 1): symbol 'helper' is not exported by module 'util'",
            "Type Error (Line 2, Position 1): module 'util' has no symbol 'ghost'",
        ]
    );
    assert!(errors.iter().all(|d| d.kind == DiagnosticKind::Type));
}

#[test]
fn import_cycles_are_rejected() {
    let modules = ModuleMap::new()
        .with_module("a", Program::new(vec![import("b", &[("g", None)], 3), function("f", true)]))
        .with_module("b", Program::new(vec![import("a", &[("f", None)], 4), function("g", true)]));
    let main = Program::new(vec![import("a", &[("f", None)], 1)]);

    let errors = resolve_modules("main", Rc::new(main), &modules).expect_err("cycle");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].to_string(),
        "Type Error (Line 4, Position 1): cyclic import of module 'a'"
    );
}

#[test]
fn program_without_imports_is_a_single_unit() {
    let program = Program::new(vec![Item {
        kind: ItemKind::Expr(Expr::new(Literal::Int(2), Span::null()).into_ptr()),
        exported: false,
        span: Span::null(),
    }]);
    let resolved = resolve_modules("main", Rc::new(program), &ModuleMap::new()).expect("ok");
    assert_eq!(resolved.units.len(), 1);
    assert!(resolved.main().is_some_and(|u| u.imports.is_empty()));
}
