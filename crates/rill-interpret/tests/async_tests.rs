use pretty_assertions::assert_eq;
use rill_interpret::{
    Completion, Gateway, NullGateway, Pipeline, RunOutcome, ScriptedGateway, ServiceOp,
    ServiceRequest, Value,
};
use serde_json::json;
use std::collections::VecDeque;

fn echo_gateway() -> ScriptedGateway {
    ScriptedGateway::new().on(ServiceOp::Ask, |args| {
        let question = args.first().and_then(|q| q.as_str()).unwrap_or_default();
        Ok(json!(format!("echo {question}")))
    })
}

fn results(outcome: RunOutcome) -> Vec<Value> {
    assert!(outcome.is_ok(), "unexpected failure:\n{}", outcome.report());
    outcome.results
}

#[test]
fn futures_can_be_awaited_in_any_order() {
    let outcome = Pipeline::new().run(
        r#"
        async fn compute(x) = x * 2;
        let a = compute(1);
        let b = compute(2);
        [await b, await a]
        "#,
    );
    assert_eq!(results(outcome), vec![Value::list(vec![Value::Int(4), Value::Int(2)])]);
}

#[test]
fn async_blocks_interleave_at_await_points() {
    let outcome = Pipeline::new().run(
        r#"
        async fn step(name, n) { log(name, n); n }
        let left = async { let x = await step("left", 1); await step("left", x + 1) };
        let right = async { let y = await step("right", 10); await step("right", y + 1) };
        await all([left, right])
        "#,
    );
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(
        outcome.log,
        vec!["left 1", "right 10", "left 2", "right 11"]
    );
    assert_eq!(
        outcome.results,
        vec![Value::list(vec![Value::Int(2), Value::Int(11)])]
    );
}

#[test]
fn gateway_replies_resolve_service_futures() {
    let gateway = echo_gateway().reply_in_reverse();
    let journal = gateway.journal();
    let outcome = Pipeline::new().with_gateway(gateway).run(
        r#"
        async fn both() {
            let a = ask("first");
            let b = ask("second");
            [await a, await b]
        }
        await both()
        "#,
    );
    assert_eq!(
        results(outcome),
        vec![Value::list(vec![
            Value::ok(Value::string("echo first")),
            Value::ok(Value::string("echo second")),
        ])]
    );
    let journal = journal.borrow();
    assert_eq!(journal.len(), 2);
    assert_eq!(journal[0].op, ServiceOp::Ask);
    assert_eq!(journal[0].args, vec![json!("first")]);
    assert_eq!(journal[1].args, vec![json!("second")]);
}

#[test]
fn missing_provider_surfaces_as_err() {
    let outcome = Pipeline::new()
        .with_gateway(NullGateway::default())
        .run("await read_file(\"notes.txt\")\n");
    assert_eq!(
        results(outcome),
        vec![Value::err(Value::string("no service provider for 'read_file'"))]
    );
}

/// Provider whose answers are only ready on every other poll.
#[derive(Default)]
struct LateGateway {
    queue: VecDeque<ServiceRequest>,
    polls: usize,
    waits: usize,
}

impl Gateway for LateGateway {
    fn dispatch(&mut self, request: ServiceRequest) -> eyre::Result<()> {
        self.queue.push_back(request);
        Ok(())
    }

    fn poll(&mut self) -> eyre::Result<Option<Completion>> {
        self.polls += 1;
        if self.polls % 2 == 1 {
            return Ok(None);
        }
        Ok(self.queue.pop_front().map(|request| Completion {
            id: request.id,
            reply: Ok(json!("late")),
        }))
    }

    fn outstanding(&self) -> usize {
        self.queue.len()
    }

    fn wait(&mut self) -> eyre::Result<()> {
        self.waits += 1;
        eyre::ensure!(self.waits < 100, "gave up waiting");
        Ok(())
    }
}

#[test]
fn replies_that_arrive_later_still_resolve() {
    let outcome = Pipeline::new()
        .with_gateway(LateGateway::default())
        .run("let a = ask(\"q\");\nlet b = ask(\"r\");\n[await a, await b]\n");
    assert_eq!(
        results(outcome),
        vec![Value::list(vec![
            Value::ok(Value::string("late")),
            Value::ok(Value::string("late")),
        ])]
    );
}

#[test]
fn spawn_returns_before_the_task_body_runs() {
    let outcome = Pipeline::new().run(
        r#"
        async fn f() { log("a"); 1 }
        async fn g() { let x = f(); log("b"); await x }
        await g()
        "#,
    );
    assert!(outcome.is_ok(), "{}", outcome.report());
    assert_eq!(outcome.log, vec!["b", "a"]);
    assert_eq!(outcome.results, vec![Value::Int(1)]);
}

#[test]
fn withheld_reply_is_a_deadlock() {
    let gateway = ScriptedGateway::new().withhold(ServiceOp::Ask);
    let outcome = Pipeline::new()
        .with_gateway(gateway)
        .run("let answer = ask(\"q\");\nawait answer\n");
    assert_eq!(
        outcome.report(),
        "Runtime Error (Line 2): future can never resolve"
    );
}

#[test]
fn combinators_recover_and_chain() {
    let outcome = Pipeline::new().run(
        r#"
        await on_error(failed("boom"), |e| "recovered " + e)
        await then(resolved(2), |x| x * 10)
        await all([resolved(1), resolved(2), async { 3 }])
        future_state(resolved(1))
        await on_complete_future(failed("bad"), |r| match r {
            Ok(v) => v,
            Err(e) => "saw " + e,
            _ => "?"
        })
        await on_error(resolved(Err("soft")), |e| "handled " + e)
        "#,
    );
    assert_eq!(
        results(outcome),
        vec![
            Value::string("recovered boom"),
            Value::Int(20),
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            Value::string("resolved"),
            Value::string("saw bad"),
            Value::string("handled soft"),
        ]
    );
}

#[test]
fn failed_future_at_top_level_is_reported() {
    let outcome = Pipeline::new().run("log(\"before\");\nawait failed(\"boom\")\n");
    assert_eq!(outcome.log, vec!["before"]);
    assert_eq!(outcome.report(), "Runtime Error (Line 2): boom");
}

#[test]
fn match_on_future_state() {
    let outcome = Pipeline::new().run(
        r#"
        let done = resolved(5);
        match done { Resolved(v) => v, Pending => 0, _ => -1 }
        "#,
    );
    assert_eq!(results(outcome), vec![Value::Int(5)]);
}
