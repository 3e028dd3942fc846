use std::collections::HashMap;
use std::sync::Arc;
use taskcore::{
    ExecutionContext, ExecutionStatus, ExecutionTaskEnvelope, ExecutorError, NodeDefinition,
    NodeExecutor, NoResources, TraceEmitter, Value,
};
use tasknodes::{
    loop_state_value, register_standard_executors, ForLoopExecutor, IfExecutor, SwitchExecutor,
    WhileLoopExecutor, LOOP_STATE_KEY,
};
use taskruntime::{EngineRuntime, ExecutorRegistry};
use uuid::Uuid;

fn context_with(entries: Vec<(&str, Value)>) -> Arc<ExecutionContext> {
    let config: HashMap<String, Value> = entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    Arc::new(ExecutionContext::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        "n1",
        config,
        Arc::new(NoResources),
        TraceEmitter::disconnected("n1"),
    ))
}

fn branch_config(condition: &str) -> Vec<(&'static str, Value)> {
    vec![
        ("condition", Value::from(condition.to_string())),
        ("next_true", Value::Array(vec![Value::from("A")])),
        ("next_false", Value::Array(vec![Value::from("B")])),
    ]
}

#[tokio::test]
async fn if_true_routes_to_true_target() {
    let ctx = context_with(branch_config("1==1"));
    let result = IfExecutor.execute(ctx).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Next);
    assert_eq!(result.next_node_key.as_deref(), Some("A"));
}

#[tokio::test]
async fn if_false_routes_to_false_target() {
    let ctx = context_with(branch_config("1==0"));
    let result = IfExecutor.execute(ctx).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Next);
    assert_eq!(result.next_node_key.as_deref(), Some("B"));
}

#[tokio::test]
async fn malformed_condition_falls_back_to_false_branch() {
    // An unreplaced template placeholder must not raise.
    let ctx = context_with(branch_config("{{payload.count}} == 1"));
    let result = IfExecutor.execute(ctx).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Next);
    assert_eq!(result.next_node_key.as_deref(), Some("B"));
}

#[tokio::test]
async fn if_reads_working_memory() {
    let ctx = context_with(branch_config("count > 3"));
    ctx.write("count", 5i64).await;
    let result = IfExecutor.execute(ctx).await.unwrap();
    assert_eq!(result.next_node_key.as_deref(), Some("A"));
}

#[tokio::test]
async fn absent_condition_is_a_hard_error() {
    let ctx = context_with(vec![("next_true", Value::from("A"))]);
    let def = NodeDefinition::new("n1", "control.if");

    let validation = IfExecutor.validate_runtime(&def, &ctx).await;
    assert!(!validation.is_passed());

    let outcome = IfExecutor.execute(ctx).await;
    assert!(matches!(outcome, Err(ExecutorError::MissingConfig(_))));
}

#[tokio::test]
async fn switch_routes_on_discriminant() {
    let mut cases = HashMap::new();
    cases.insert("small".to_string(), Value::from("handle_small"));
    cases.insert("large".to_string(), Value::from("handle_large"));

    let ctx = context_with(vec![
        ("expression", Value::from("size")),
        ("cases", Value::Object(cases.clone())),
        ("default", Value::from("handle_other")),
    ]);
    ctx.write("size", "large").await;
    let result = SwitchExecutor.execute(ctx).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Next);
    assert_eq!(result.next_node_key.as_deref(), Some("handle_large"));

    let ctx = context_with(vec![
        ("expression", Value::from("size")),
        ("cases", Value::Object(cases)),
        ("default", Value::from("handle_other")),
    ]);
    ctx.write("size", "enormous").await;
    let result = SwitchExecutor.execute(ctx).await.unwrap();
    assert_eq!(result.next_node_key.as_deref(), Some("handle_other"));
}

fn for_loop_config() -> Vec<(&'static str, Value)> {
    vec![
        (
            "items",
            Value::Array(vec![Value::from("x"), Value::from("y"), Value::from("z")]),
        ),
        ("next", Value::from("body")),
        ("done", Value::from("end")),
    ]
}

#[tokio::test]
async fn for_loop_is_stateless_across_dispatches() {
    let mut carried_state = None;
    let mut visited_indexes = Vec::new();

    // The walker: each dispatch gets a fresh context holding only the
    // previous result's loop state.
    for step in 0..4 {
        let ctx = context_with(for_loop_config());
        if let Some(state) = &carried_state {
            ctx.write(LOOP_STATE_KEY, loop_state_value(state)).await;
        }
        let result = ForLoopExecutor.execute(ctx).await.unwrap();

        if step < 3 {
            assert_eq!(result.status, ExecutionStatus::LoopNext);
            assert_eq!(result.next_node_key.as_deref(), Some("body"));
            let index = result.output.get("index").and_then(|v| v.as_f64()).unwrap();
            visited_indexes.push(index as usize);
        } else {
            assert_eq!(result.status, ExecutionStatus::LoopEnd);
            assert_eq!(result.next_node_key.as_deref(), Some("end"));
        }
        carried_state = result.loop_state;
    }

    // Exactly one step per dispatch, no index revisited.
    assert_eq!(visited_indexes, vec![0, 1, 2]);
}

#[tokio::test]
async fn for_loop_reads_items_from_working_memory() {
    let ctx = context_with(vec![
        ("items_key", Value::from("rows")),
        ("next", Value::from("body")),
        ("done", Value::from("end")),
    ]);
    ctx.write("rows", vec![Value::from(10i64), Value::from(20i64)])
        .await;
    let result = ForLoopExecutor.execute(ctx).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::LoopNext);
    assert_eq!(result.output.get("item"), Some(&Value::Number(10.0)));
    // The snapshot travels in the state, so later dispatches do not depend
    // on the memory key still being present.
    assert!(result.loop_state.unwrap().items.is_some());
}

#[tokio::test]
async fn for_loop_break_condition_short_circuits() {
    let mut config = for_loop_config();
    config.push(("break_if", Value::from("halt == true")));
    let ctx = context_with(config);
    ctx.write("halt", true).await;
    let result = ForLoopExecutor.execute(ctx).await.unwrap();
    assert_eq!(result.status, ExecutionStatus::LoopBreak);
    assert_eq!(result.next_node_key.as_deref(), Some("end"));
}

#[tokio::test]
async fn while_loop_advances_then_ends() {
    let config = vec![
        ("condition", Value::from("count < 2")),
        ("next", Value::from("body")),
        ("done", Value::from("end")),
    ];

    let ctx = context_with(config.clone());
    ctx.write("count", 0i64).await;
    let first = WhileLoopExecutor.execute(ctx).await.unwrap();
    assert_eq!(first.status, ExecutionStatus::LoopNext);
    assert_eq!(first.loop_state.as_ref().unwrap().index, 1);

    let ctx = context_with(config);
    ctx.write("count", 5i64).await;
    ctx.write(
        LOOP_STATE_KEY,
        loop_state_value(first.loop_state.as_ref().unwrap()),
    )
    .await;
    let second = WhileLoopExecutor.execute(ctx).await.unwrap();
    assert_eq!(second.status, ExecutionStatus::LoopEnd);
    assert_eq!(second.next_node_key.as_deref(), Some("end"));
}

#[tokio::test]
async fn while_loop_guard_breaks_runaway_iteration() {
    let config = vec![
        ("condition", Value::from("1==1")),
        ("next", Value::from("body")),
        ("done", Value::from("end")),
        ("max_iterations", Value::from(2i64)),
    ];

    let mut carried_state = None;
    let mut statuses = Vec::new();
    for _ in 0..3 {
        let ctx = context_with(config.clone());
        if let Some(state) = &carried_state {
            ctx.write(LOOP_STATE_KEY, loop_state_value(state)).await;
        }
        let result = WhileLoopExecutor.execute(ctx).await.unwrap();
        statuses.push(result.status);
        carried_state = result.loop_state;
    }

    assert_eq!(
        statuses,
        vec![
            ExecutionStatus::LoopNext,
            ExecutionStatus::LoopNext,
            ExecutionStatus::LoopBreak,
        ]
    );
}

#[tokio::test]
async fn branch_dispatches_through_the_gateway() {
    let mut registry = ExecutorRegistry::new();
    register_standard_executors(&mut registry);
    let runtime = EngineRuntime::new(registry);

    let config: HashMap<String, Value> = branch_config("1==1")
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let context = runtime.context(Uuid::new_v4(), Uuid::new_v4(), "branch-1", config);
    let definition = NodeDefinition::new("branch-1", "control.if");
    let envelope = ExecutionTaskEnvelope::new(definition, context);

    let result = runtime.execute_async(envelope).await.await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Next);
    assert_eq!(result.next_node_key.as_deref(), Some("A"));
}

#[tokio::test]
async fn http_executor_requires_a_client_manager() {
    use tasknodes::HttpRequestExecutor;
    let ctx = context_with(vec![("url", Value::from("https://example.com"))]);
    let outcome = HttpRequestExecutor.execute(ctx).await;
    assert!(matches!(
        outcome,
        Err(ExecutorError::Resource(
            taskcore::ResourceError::UnknownManager(_)
        ))
    ));
}
