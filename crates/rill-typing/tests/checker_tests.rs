use pretty_assertions::assert_eq;
use rill_core::ast::ItemKind;
use rill_core::diagnostics::{Diagnostic, DiagnosticKind};
use rill_core::module::{resolve_modules, ModuleMap, ResolvedProgram};
use rill_lang::parse_program;
use rill_typing::{check_program, CheckedProgram};
use std::rc::Rc;

fn check(src: &str) -> Result<CheckedProgram, Vec<Diagnostic>> {
    let program = parse_program(src).unwrap_or_else(|e| panic!("parse failed: {e}"));
    check_program(&ResolvedProgram::single("main", Rc::new(program)))
}

fn errors(src: &str) -> Vec<String> {
    match check(src) {
        Ok(_) => panic!("expected type errors for:\n{src}"),
        Err(errors) => errors.iter().map(|d| d.message.clone()).collect(),
    }
}

fn assert_ok(src: &str) -> CheckedProgram {
    check(src).unwrap_or_else(|errors| {
        let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
        panic!("unexpected type errors:\n{}", rendered.join("\n"))
    })
}

#[test]
fn well_typed_program_passes() {
    let checked = assert_ok(
        r#"
        record Point { x: Int, y: Int }
        enum Shape { Circle(Float), Rect(Float, Float), Empty }
        fn area(s) = match s {
            Shape::Circle(r) => 3.14 * r * r,
            Shape::Rect(w, h) => w * h,
            _ => 0.0
        };
        let p = Point { x: 1, y: 2 };
        let q = p with { y: 5 };
        let total = q.x + q.y;
        let shapes = [Shape::Circle(1.0), Shape::Rect(2.0, 3.0), Shape::Empty];
        map(shapes, area)
        "#,
    );
    assert!(checked.warnings.is_empty());
    assert!(checked.schemas.record("Point").is_some());
}

#[test]
fn arithmetic_on_non_numbers_is_rejected() {
    assert_eq!(
        errors("let a = true * 2;"),
        vec!["arithmetic operator `*` expects numbers, found Bool"]
    );
    assert_eq!(
        errors(r#"let b = "n" + 1;"#),
        vec!["operator `+` cannot be applied to String and Int"]
    );
    assert_ok(r#"let c = "a" + "b"; let d = 1 + 2.5;"#);
}

#[test]
fn record_with_rejects_unknown_fields() {
    let err = check(
        r#"
        record Point { x: Int, y: Int }
        Point { x: 1, y: 2 } with { z: 3 }
        "#,
    )
    .expect_err("unknown field");
    assert_eq!(err.len(), 1);
    assert_eq!(err[0].kind, DiagnosticKind::Type);
    assert_eq!(err[0].message, "record 'Point' has no field 'z'");
    assert!(err[0].to_string().starts_with("Type Error (Line 3, Position"));
}

#[test]
fn record_construction_needs_exactly_the_declared_fields() {
    let messages = errors(
        r#"
        record User { name: String, age: Int }
        let u = User { name: "ann", nick: "a" };
        let v = User { name: 3, age: 1 };
        let w = u.email;
        "#,
    );
    assert_eq!(
        messages,
        vec![
            "record 'User' has no field 'nick'",
            "missing field 'age' in record 'User'",
            "field 'name': expected String, found Int",
            "record 'User' has no field 'email'",
        ]
    );
}

#[test]
fn enum_construction_uses_declared_variants() {
    let messages = errors(
        r#"
        enum Shape { Circle(Float), Empty }
        let a = Shape::Square(1.0);
        let b = Shape::Circle("big");
        let c = Shape::Empty(1);
        "#,
    );
    assert_eq!(
        messages,
        vec![
            "enum 'Shape' has no variant 'Square'",
            "payload of 'Shape::Circle': expected Float, found String",
            "variant 'Shape::Empty' takes no payload",
        ]
    );
}

#[test]
fn tuple_destructuring_arity_must_match() {
    assert_eq!(
        errors("let (x, y) = (1, 2, 3);"),
        vec!["tuple pattern has 2 element(s) but the value has 3"]
    );
    assert_ok("let (x, y) = (1, 2); x + y");
}

#[test]
fn match_requires_trailing_wildcard() {
    assert_eq!(
        errors("let r = match 3 { 1 => \"one\", n => \"many\" };"),
        vec!["match must end with a wildcard arm `_ =>`"]
    );
    assert_eq!(
        errors("let r = match 3 { 1 => 1, _ if true => 2 };"),
        vec!["match must end with a wildcard arm `_ =>`"]
    );
}

#[test]
fn rebinding_in_the_same_scope_is_rejected() {
    assert_eq!(
        errors("let x = 1;\nlet x = 2;"),
        vec!["'x' is already defined in this scope"]
    );
    assert_ok("let x = 1; let y = { let x = 2; x };");
    assert_eq!(
        errors("fn f(a, a) = a;"),
        vec!["duplicate parameter 'a'"]
    );
}

#[test]
fn constant_refinements_are_checked_statically() {
    let messages = errors(
        r#"
        type Percent = Int where value >= 0 && value <= 100;
        type Name = String where len(value) > 0;
        let ok: Percent = 40;
        let bad: Percent = 150;
        let empty: Name = "";
        fn scale(p: Percent) = p * 2;
        scale(101)
        "#,
    );
    assert_eq!(
        messages,
        vec![
            "value 150 does not satisfy refinement 'Percent'",
            "value \"\" does not satisfy refinement 'Name'",
            "value 101 does not satisfy refinement 'Percent'",
        ]
    );
}

#[test]
fn refinements_over_runtime_values_are_deferred() {
    assert_ok(
        r#"
        type Percent = Int where value >= 0 && value <= 100;
        fn pick(x) { let p: Percent = x; p }
        pick(7)
        "#,
    );
}

#[test]
fn await_placement() {
    let messages = errors(
        r#"
        async fn fetch_one() = 1;
        fn sync_caller() = await fetch_one();
        let guarded = match 1 { n if await fetch_one() == n => 1, _ => 0 };
        "#,
    );
    assert_eq!(
        messages,
        vec![
            "await is only allowed inside async functions and blocks",
            "await is not allowed in a match guard",
        ]
    );
    assert_ok(
        r#"
        async fn fetch_one() = 1;
        async fn caller() = await fetch_one() + 1;
        let top = await caller();
        let block = async { await fetch_one() };
        "#,
    );
}

#[test]
fn too_many_arguments() {
    assert_eq!(
        errors("fn add(a, b) = a + b;\nadd(1, 2, 3)"),
        vec!["function expects 2 argument(s), found 3"]
    );
    assert_eq!(
        errors("len([1], 2)"),
        vec!["'len' expects 1 argument(s), found 2"]
    );
    // partial application is fine
    assert_ok("fn add(a, b) = a + b;\nlet inc = add(1);\ninc(2)");
}

#[test]
fn unknown_types_in_annotations() {
    assert_eq!(
        errors("fn f(w: Widget) = w;"),
        vec!["unknown type 'Widget'"]
    );
}

#[test]
fn infinite_stream_without_take_warns() {
    let checked = assert_ok(
        r#"
        let naturals = generate_infinite(|i| i);
        let evens = naturals |> filter(|n| n % 2 == 0);
        collect(evens)
        collect(take(evens, 3))
        "#,
    );
    assert_eq!(checked.warnings.len(), 1);
    assert_eq!(
        checked.warnings[0].message,
        "unbounded stream from generate_infinite reaches `collect` without `take`"
    );
    assert_eq!(checked.warnings[0].kind, DiagnosticKind::Warning);
}

#[test]
fn purity_analysis_marks_memoizable_functions() {
    let program = parse_program(
        r#"
        fn square(x) { log("squaring", x); x * x }
        fn sum_squares(a, b) = square(a) + square(b);
        fn remote(q) = ask(q);
        fn relay(q) = remote(q);
        async fn later(x) = x;
        "#,
    )
    .expect("parses");
    let ids: Vec<_> = program
        .items
        .iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Function(decl) => Some(decl.id),
            _ => None,
        })
        .collect();
    let checked =
        check_program(&ResolvedProgram::single("main", Rc::new(program))).expect("checks");
    let pure: Vec<bool> = ids.iter().map(|id| checked.purity.is_pure(*id)).collect();
    assert_eq!(pure, vec![true, true, false, false, false]);
}

#[test]
fn imported_function_types_flow_across_modules() {
    let lib = parse_program("export fn double(x: Int) -> Int = x * 2;").expect("lib parses");
    let main = parse_program(
        r#"
        import { double as twice } from "math";
        twice("nope")
        "#,
    )
    .expect("main parses");
    let modules = ModuleMap::new().with_module("math", lib);
    let resolved = resolve_modules("main", Rc::new(main), &modules).expect("resolves");
    let errors = check_program(&resolved).expect_err("argument mismatch");
    assert_eq!(errors[0].message, "argument 1: expected Int, found String");
}
