use pretty_assertions::assert_eq;
use rill_core::config::InterpreterOptions;
use rill_interpret::{Pipeline, Value};

const SQUARES: &str = r#"
fn square(x) { log("squaring", x); x * x }
square(4)
square(4)
square(5)
"#;

#[test]
fn pure_calls_are_evaluated_once_per_argument() {
    let outcome = Pipeline::new()
        .with_options(InterpreterOptions::default().with_memoize(true))
        .run(SQUARES);
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(outcome.results, vec![Value::Int(16), Value::Int(16), Value::Int(25)]);
    assert_eq!(outcome.evaluations_of("square"), 2);
    assert_eq!(outcome.memo_hits, 1);
    assert_eq!(outcome.log, vec!["squaring 4", "squaring 5"]);
}

#[test]
fn disabling_memoization_reevaluates() {
    let outcome = Pipeline::new()
        .with_options(InterpreterOptions::default().with_memoize(false))
        .run(SQUARES);
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(outcome.evaluations_of("square"), 3);
    assert_eq!(outcome.memo_hits, 0);
    assert_eq!(outcome.log.len(), 3);
}

#[test]
fn recursive_pure_function_is_linear() {
    let outcome = Pipeline::new()
        .with_options(InterpreterOptions::default().with_memoize(true))
        .run("fn fib(n) = if n < 2 { n } else { fib(n - 1) + fib(n - 2) };\nfib(30)\n");
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(outcome.results, vec![Value::Int(832040)]);
    assert_eq!(outcome.evaluations_of("fib"), 31);
}

#[test]
fn effectful_functions_are_not_cached() {
    let outcome = Pipeline::new()
        .with_options(InterpreterOptions::default().with_memoize(true))
        .run(
            r#"
            fn fetch(q) = ask(q);
            fn shout(s) = upper(s);
            fetch("a");
            fetch("a");
            shout("a")
            shout("a")
            "#,
        );
    assert_eq!(outcome.evaluations_of("fetch"), 2);
    assert_eq!(outcome.evaluations_of("shout"), 1);
    assert_eq!(
        outcome.results.last(),
        Some(&Value::string("A"))
    );
}

#[test]
fn function_arguments_bypass_the_cache() {
    let outcome = Pipeline::new()
        .with_options(InterpreterOptions::default().with_memoize(true))
        .run(
            r#"
            fn apply(f, x) = f(x);
            apply(|x| x + 1, 1)
            apply(|x| x + 1, 1)
            "#,
        );
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(outcome.results, vec![Value::Int(2), Value::Int(2)]);
    assert_eq!(outcome.evaluations_of("apply"), 2);
}
