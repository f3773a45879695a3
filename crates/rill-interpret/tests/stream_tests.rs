use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rill_interpret::{run_source, Value};

const UNBOUNDED_COLLECT: &str =
    "Runtime Error (Line 2): unbounded stream reaches `collect` without a bounding `take`";

fn ints(values: &[i64]) -> Value {
    Value::list(values.iter().copied().map(Value::Int).collect())
}

fn results(src: &str) -> Vec<Value> {
    let outcome = run_source(src);
    assert!(outcome.is_ok(), "unexpected failure:\n{}", outcome.report());
    outcome.results
}

#[test]
fn stream_pipeline_matches_list_pipeline() {
    let stages = [
        "map(|x| x * 3)",
        "map(|x| x - 7)",
        "filter(|x| x % 2 == 0)",
        "filter(|x| x > 0)",
        "flat_map(|x| [x, x + 1])",
        "take(5)",
        "skip(2)",
    ];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..40 {
        let len: usize = rng.gen_range(0..20);
        let items: Vec<String> = (0..len).map(|_| rng.gen_range(-50i64..50).to_string()).collect();
        let chain: Vec<&str> = (0..rng.gen_range(1..5))
            .map(|_| stages[rng.gen_range(0..stages.len())])
            .collect();
        let pipes = chain.iter().map(|stage| format!(" |> {stage}")).collect::<String>();
        let source = format!(
            "let xs = [{}];\ncollect(stream_of(xs){pipes})\nxs{pipes}\n",
            items.join(", ")
        );
        let values = results(&source);
        assert_eq!(values.len(), 2, "{source}");
        assert_eq!(values[0], values[1], "{source}");
    }
}

#[test]
fn take_bounds_an_infinite_generator() {
    assert_eq!(
        results(
            r#"
            let naturals = generate_infinite(|i| i);
            collect(naturals |> filter(|n| n % 2 == 0) |> map(|n| n * n) |> take(4))
            first(naturals |> skip(10))
            "#
        ),
        vec![ints(&[0, 4, 16, 36]), Value::some(Value::Int(10))]
    );
}

#[test]
fn unbounded_collect_is_a_runtime_error() {
    let outcome = run_source(
        "let naturals = generate_infinite(|i| i);\ncollect(naturals |> map(|n| n + 1))\n",
    );
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(
        outcome.error.map(|err| err.to_string()),
        Some(UNBOUNDED_COLLECT.to_string())
    );
}

#[test]
fn flat_map_into_an_infinite_stream_needs_a_take() {
    let outcome = run_source(
        "let s = stream_of([1]);\ncollect(s |> flat_map(|x| generate_infinite(|i| i)))\n",
    );
    assert_eq!(
        outcome.error.map(|err| err.to_string()),
        Some(UNBOUNDED_COLLECT.to_string())
    );
    assert_eq!(
        results(
            r#"
            let s = stream_of([1, 2]);
            collect(s |> flat_map(|x| generate_infinite(|i| i * x)) |> take(3))
            "#
        ),
        vec![ints(&[0, 1, 2])]
    );
}

#[test]
fn stream_stages_run_lazily_per_element() {
    let outcome = run_source(
        r#"
        let s = stream_range(1, 100) |> map(|x| { log("map", x); x * 10 }) |> take(2);
        log("built");
        collect(s)
        "#,
    );
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(outcome.log, vec!["built", "map 1", "map 2"]);
    assert_eq!(outcome.results.last(), Some(&ints(&[10, 20])));
}

#[test]
fn terminal_operations() {
    assert_eq!(
        results(
            r#"
            stream_range(1, 5) |> reduce(0, |acc, x| acc + x)
            stream_range(0, 10, 3) |> count
            stream_generate(3, |i| i * 2) |> collect
            stream_of([1, 2, 3, 4, 5]) |> chunk(2)
            stream_empty() |> first
            sum(stream_of([1.5, 2.5]))
            "#
        ),
        vec![
            Value::Int(10),
            Value::Int(4),
            ints(&[0, 2, 4]),
            Value::list(vec![ints(&[1, 2]), ints(&[3, 4]), ints(&[5])]),
            Value::none(),
            Value::Float(4.0),
        ]
    );
}

#[test]
fn a_stream_can_be_consumed_twice() {
    assert_eq!(
        results(
            r#"
            let s = stream_of([1, 2, 3]) |> map(|x| x + 1);
            collect(s)
            collect(s)
            "#
        ),
        vec![ints(&[2, 3, 4]), ints(&[2, 3, 4])]
    );
}
