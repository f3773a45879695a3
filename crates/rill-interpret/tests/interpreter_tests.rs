use pretty_assertions::assert_eq;
use rill_core::config::InterpreterOptions;
use rill_interpret::{Pipeline, RunOutcome, Value};
use std::collections::BTreeMap;

fn run(src: &str) -> RunOutcome {
    Pipeline::new()
        .with_options(InterpreterOptions::default().with_max_call_depth(64))
        .run(src)
}

fn results(src: &str) -> Vec<Value> {
    let outcome = run(src);
    assert!(outcome.is_ok(), "unexpected failure:\n{}", outcome.report());
    outcome.results
}

fn ints(values: &[i64]) -> Value {
    Value::list(values.iter().copied().map(Value::Int).collect())
}

fn map_of(entries: &[(&str, i64)]) -> Value {
    Value::map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Int(*v)))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[test]
fn arithmetic_and_strings() {
    assert_eq!(
        results(
            r#"
            1 + 2 * 3
            7 / 2
            7 % 3
            1 + 2.5
            "ab" + "cd"
            !(1 < 2) || 3 >= 3
            "#
        ),
        vec![
            Value::Int(7),
            Value::Int(3),
            Value::Int(1),
            Value::Float(3.5),
            Value::string("abcd"),
            Value::Bool(true),
        ]
    );
}

#[test]
fn merge_leaves_operands_untouched() {
    assert_eq!(
        results(
            r#"
            let left = {a: 1, b: 2};
            let merged = merge(left, {a: 10});
            merged
            left
            "#
        ),
        vec![map_of(&[("a", 10), ("b", 2)]), map_of(&[("a", 1), ("b", 2)])]
    );
}

#[test]
fn list_builtins_return_new_lists() {
    assert_eq!(
        results(
            r#"
            let xs = [1, 2, 3];
            let ys = append(xs, 4);
            xs
            ys
            reverse(ys)
            head(xs)
            tail(xs)
            nth(xs, 7)
            len(ys)
            "#
        ),
        vec![
            ints(&[1, 2, 3]),
            ints(&[1, 2, 3, 4]),
            ints(&[4, 3, 2, 1]),
            Value::some(Value::Int(1)),
            ints(&[2, 3]),
            Value::none(),
            Value::Int(4),
        ]
    );
}

#[test]
fn partial_application_curries_functions_and_builtins() {
    assert_eq!(
        results(
            r#"
            fn add(a, b) = a + b;
            let add5 = add(5);
            add5(10)
            map([1, 2, 3], add(10));
            [1, 2] |> map(|x| x * 2) |> sum
            "#
        ),
        vec![Value::Int(15), ints(&[11, 12, 13]), Value::Int(6)]
    );
}

#[test]
fn question_mark_returns_early_from_function() {
    let outcome = run(
        r#"
        fn g() = Err("x");
        fn f() {
            g()?;
            log("unreachable");
            1
        }
        f()
        fn h() { let v = Ok(4)?; Ok(v + 1) }
        h()
        "#,
    );
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(
        outcome.results,
        vec![Value::err(Value::string("x")), Value::ok(Value::Int(5))]
    );
    assert!(outcome.log.is_empty());
}

#[test]
fn question_mark_at_top_level_is_an_error() {
    let outcome = run("let a = 1;\nErr(\"boom\")?\n");
    assert_eq!(
        outcome.report(),
        "Runtime Error (Line 2): unhandled Err(\"boom\") at top level"
    );
}

#[test]
fn index_out_of_bounds_reports_line() {
    let outcome = run("let xs = [1, 2, 3];\nlet y = 0;\nxs[5]\n");
    assert_eq!(
        outcome.report(),
        "Runtime Error (Line 3): index 5 out of bounds for List of length 3"
    );
    assert!(outcome.results.is_empty());
}

#[test]
fn results_before_a_failure_are_kept() {
    let outcome = run("fn div(a, b) = a / b;\n1\ndiv(10, 0)\n3\n");
    assert_eq!(outcome.results, vec![Value::Int(1)]);
    assert_eq!(outcome.report(), "Runtime Error (Line 1): division by zero");
}

#[test]
fn refinement_is_checked_at_runtime() {
    let source = "type Percent = Int where value >= 0 && value <= 100;\n\
                  fn pick(x) { let p: Percent = x; p }\n\
                  pick(50)\n\
                  pick(150)\n";
    let outcome = run(source);
    assert_eq!(outcome.results, vec![Value::Int(50)]);
    assert_eq!(
        outcome.report(),
        "Runtime Error (Line 2): value 150 does not satisfy refinement 'Percent'"
    );
}

#[test]
fn records_are_updated_by_copy() {
    let values = results(
        r#"
        record Point { x: Int, y: Int }
        let p = Point { x: 1, y: 2 };
        let q = p with { y: 5 };
        p.y
        q.y
        q.x
        q == Point { x: 1, y: 5 }
        "#,
    );
    assert_eq!(
        values,
        vec![Value::Int(2), Value::Int(5), Value::Int(1), Value::Bool(true)]
    );
}

#[test]
fn enums_and_match() {
    let values = results(
        r#"
        enum Shape { Circle(Float), Rect(Float, Float), Empty }
        fn area(s) = match s {
            Shape::Circle(r) => 3.0 * r * r,
            Shape::Rect(w, h) => w * h,
            _ => 0.0
        };
        [Shape::Circle(1.0), Shape::Rect(2.0, 3.0), Shape::Empty] |> map(area)
        "#,
    );
    assert_eq!(
        values,
        vec![Value::list(vec![
            Value::Float(3.0),
            Value::Float(6.0),
            Value::Float(0.0)
        ])]
    );
}

#[test]
fn match_guards_and_list_patterns() {
    let values = results(
        r#"
        fn describe(xs) = match xs {
            [] => "empty",
            [x] if x > 10 => "one big",
            [x] => "one",
            [x, ...rest] => "many",
            _ => "other"
        };
        [describe([]), describe([50]), describe([1]), describe([1, 2, 3])]
        fn first_or(o, d) = match o { Some(v) => v, None => d, _ => d };
        first_or(head([9]), 0)
        first_or(head([]), 0)
        "#,
    );
    assert_eq!(
        values,
        vec![
            Value::list(vec![
                Value::string("empty"),
                Value::string("one big"),
                Value::string("one"),
                Value::string("many"),
            ]),
            Value::Int(9),
            Value::Int(0),
        ]
    );
}

#[test]
fn imported_functions_run_in_their_module() {
    let outcome = Pipeline::new()
        .with_module(
            "math",
            r#"
            let factor = 2;
            export fn double(x: Int) -> Int = x * factor;
            "#,
        )
        .expect("module parses")
        .run(
            r#"
            import { double as twice } from "math";
            twice(21)
            "#,
        );
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(outcome.results, vec![Value::Int(42)]);
}

#[test]
fn log_collects_lines_in_order() {
    let outcome = run(
        r#"
        log("a", 1);
        log([1, "x"]);
        log(stream_of([1, 2]));
        "#,
    );
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(outcome.log, vec!["a 1", "[1, \"x\"]", "1", "2"]);
}

#[test]
fn deep_recursion_hits_the_call_limit() {
    let outcome = run("fn down(n) = if n == 0 { 0 } else { down(n - 1) };\ndown(1000)\n");
    let report = outcome.report();
    assert!(report.starts_with("Runtime Error (Line "), "{report}");
    assert!(report.ends_with("maximum call depth of 64 exceeded"), "{report}");
}

#[test]
fn recursion_near_the_default_limit_stays_on_the_stack() {
    let source = "fn down(n) = if n == 0 { 0 } else { 1 + down(n - 1) };\ndown(500)\ndown(5000)\n";
    let outcome = Pipeline::new().run(source);
    assert_eq!(outcome.results, vec![Value::Int(500)]);
    let report = outcome.report();
    assert!(report.starts_with("Runtime Error (Line "), "{report}");
    assert!(report.ends_with("maximum call depth of 512 exceeded"), "{report}");
}

#[test]
fn type_errors_stop_before_evaluation() {
    let outcome = run("log(\"never\");\nlet b = \"n\" + 1;\n");
    assert!(outcome.log.is_empty());
    assert!(matches!(outcome.error, Some(rill_core::Error::Type(_))));
}
