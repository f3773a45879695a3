use pretty_assertions::assert_eq;
use rill_core::ast::{ExprKind, ItemKind, PatternKind, Program, Stmt, TypeExpr};
use rill_lang::{parse_program, parse_source};

fn parse(src: &str) -> Program {
    parse_program(src).unwrap_or_else(|e| panic!("parse failed for `{src}`: {e}"))
}

#[test]
fn declarations_are_parsed_in_order() {
    let program = parse(
        r#"
        import { fetch as get, Point } from "net";
        record User { name: String, age: Int }
        enum Shape { Circle(Float), Rect(Float, Float), Empty }
        type Age = Int where value >= 0;
        export fn add(a: Int, b: Int) -> Int = a + b;
        async fn load(url) { await get(url) }
        let total = add(1, 2);
        total
        "#,
    );
    let kinds: Vec<&str> = program
        .items
        .iter()
        .map(|item| match &item.kind {
            ItemKind::Import(_) => "import",
            ItemKind::Record(_) => "record",
            ItemKind::Enum(_) => "enum",
            ItemKind::Alias(_) => "alias",
            ItemKind::Function(_) => "fn",
            ItemKind::Let(_) => "let",
            ItemKind::Expr(_) => "expr",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["import", "record", "enum", "alias", "fn", "fn", "let", "expr"]
    );

    let ItemKind::Import(import) = &program.items[0].kind else {
        panic!("expected import");
    };
    assert_eq!(import.module, "net");
    assert_eq!(import.names[0].local(), "get");

    let ItemKind::Enum(shape) = &program.items[2].kind else {
        panic!("expected enum");
    };
    assert_eq!(shape.variants[1].payload.len(), 2);

    let ItemKind::Alias(alias) = &program.items[3].kind else {
        panic!("expected alias");
    };
    assert!(alias.predicate.is_some());

    assert!(program.items[4].exported);
    let ItemKind::Function(load) = &program.items[5].kind else {
        panic!("expected fn");
    };
    assert!(load.is_async);
    assert!(load.body.suspends);
}

#[test]
fn generic_types_nest() {
    let program = parse("fn f(xs: Map<String, List<Int>>) = xs;");
    let ItemKind::Function(f) = &program.items[0].kind else {
        panic!("expected fn");
    };
    let Some(TypeExpr::Named { name, args, .. }) = &f.params[0].ty else {
        panic!("expected named type");
    };
    assert_eq!(name, "Map");
    assert_eq!(args[1].to_string(), "List<Int>");
}

#[test]
fn match_patterns_cover_every_shape() {
    let program = parse(
        r#"
        match v {
            [] => 0,
            [h, ...t] => 1,
            Point { x, y: 0, .. } => 2,
            Shape::Rect(w, h) => 3,
            Some(Ok(n)) if n > 1 => 4,
            (a, b) => 5,
            { name: n } => 6,
            -1 => 7,
            Resolved(v) => 8,
            _ => 9
        }
        "#,
    );
    let ItemKind::Expr(expr) = &program.items[0].kind else {
        panic!("expected expr");
    };
    let ExprKind::Match(m) = &expr.kind else {
        panic!("expected match");
    };
    assert_eq!(m.arms.len(), 10);
    assert!(matches!(
        &m.arms[1].pattern.kind,
        PatternKind::List { items, rest: Some(_) } if items.len() == 1
    ));
    assert!(matches!(
        &m.arms[2].pattern.kind,
        PatternKind::Record { fields, rest: true, .. } if fields.len() == 2
    ));
    assert!(matches!(
        &m.arms[3].pattern.kind,
        PatternKind::Variant { payload: Some(p), .. } if matches!(p.kind, PatternKind::Tuple(_))
    ));
    assert!(m.arms[4].guard.is_some());
    assert!(m.arms[9].pattern.is_wildcard());
    assert_eq!(m.arms[2].pattern.bindings(), vec!["x"]);
}

#[test]
fn records_maps_and_blocks_are_distinguished() {
    let program = parse(
        r#"
        let p = Point { x: 1, y: 2 };
        let m = { a: 1, "b c": 2 };
        let e = {};
        let b = { let z = 1; z + 1 };
        let q = p with { x: 5 };
        "#,
    );
    let values: Vec<&ExprKind> = program
        .items
        .iter()
        .map(|item| match &item.kind {
            ItemKind::Let(stmt) => &stmt.value.kind,
            _ => panic!("expected let"),
        })
        .collect();
    assert!(matches!(values[0], ExprKind::Struct(_)));
    assert!(matches!(values[1], ExprKind::Map(m) if m.entries.len() == 2));
    assert!(matches!(values[2], ExprKind::Map(m) if m.entries.is_empty()));
    let ExprKind::Block(block) = values[3] else {
        panic!("expected block");
    };
    assert!(matches!(block.stmts[0], Stmt::Let(_)));
    assert!(block.tail.is_some());
    assert!(matches!(values[4], ExprKind::With(_)));
}

#[test]
fn syntax_errors_report_line_and_position() {
    let err = parse_source("let a = 1;\nlet b = (2;\n").expect_err("should fail");
    let rendered = err.to_string();
    assert!(
        rendered.starts_with("Syntax Error (Line 2, Position 11):"),
        "unexpected report: {rendered}"
    );
}

#[test]
fn unterminated_string_is_a_syntax_error() {
    let err = parse_source("let s = \"abc").expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "Syntax Error (Line 1, Position 9): unterminated string literal"
    );
}

#[test]
fn tuple_index_and_method_calls() {
    let program = parse("pair.0 + user.greet(1)");
    let ItemKind::Expr(expr) = &program.items[0].kind else {
        panic!("expected expr");
    };
    let ExprKind::BinOp(add) = &expr.kind else {
        panic!("expected add");
    };
    assert!(matches!(&add.lhs.kind, ExprKind::Select(s) if s.field == "0"));
    assert!(matches!(
        &add.rhs.kind,
        ExprKind::Method(m) if m.method == "greet" && m.args.len() == 1
    ));
}
