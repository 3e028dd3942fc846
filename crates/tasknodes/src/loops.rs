use crate::condition::evaluate_condition;
use async_trait::async_trait;
use std::sync::Arc;
use taskcore::{
    ExecutionContext, ExecutionResult, ExecutorError, LoopState, NodeDefinition, NodeExecutor,
    ValidationResult, Value,
};

/// Working-memory key the graph walker writes the previous result's loop
/// state into before re-dispatching a loop node.
pub const LOOP_STATE_KEY: &str = "loop_state";

async fn read_loop_state(ctx: &ExecutionContext) -> Option<LoopState> {
    let value = ctx.read(LOOP_STATE_KEY).await?;
    let json = value.as_json()?.clone();
    serde_json::from_value(json).ok()
}

/// Serialize a state for tests and walkers feeding it back into a context.
pub fn loop_state_value(state: &LoopState) -> Value {
    serde_json::to_value(state)
        .map(Value::Json)
        .unwrap_or(Value::Null)
}

/// Indexed `for` loop over a collection. Evaluates exactly one step per
/// dispatch: visiting item `i` returns `LOOP_NEXT` with the state advanced
/// to `i + 1`; past the last item it returns `LOOP_END`. All iteration
/// state travels in the result, never in executor fields, so the walker can
/// persist and restore it across dispatches.
pub struct ForLoopExecutor;

impl ForLoopExecutor {
    async fn resolve_items(&self, ctx: &ExecutionContext) -> Result<Vec<Value>, ExecutorError> {
        if let Some(Value::Array(items)) = ctx.config.get("items") {
            return Ok(items.clone());
        }
        if let Some(key) = ctx.config.get("items_key").map(|v| v.coerce_string()) {
            if let Some(Value::Array(items)) = ctx.read(&key).await {
                return Ok(items);
            }
            return Err(ExecutorError::InvalidConfig(format!(
                "'{key}' does not hold an array"
            )));
        }
        Err(ExecutorError::MissingConfig("items".to_string()))
    }
}

#[async_trait]
impl NodeExecutor for ForLoopExecutor {
    fn identifier(&self) -> &str {
        "control.for"
    }

    async fn validate_runtime(
        &self,
        _def: &NodeDefinition,
        ctx: &ExecutionContext,
    ) -> ValidationResult {
        let mut validation = ValidationResult::pass();
        if ctx.config.get("next").is_none() {
            validation.add_failure("'next' (loop body node key) is required");
        }
        if ctx.config.get("done").is_none() {
            validation.add_failure("'done' (post-loop node key) is required");
        }
        validation
    }

    async fn execute(&self, ctx: Arc<ExecutionContext>) -> Result<ExecutionResult, ExecutorError> {
        let body = ctx.require_config("next")?.coerce_string();
        let done = ctx.require_config("done")?.coerce_string();

        let (index, carried_items) = match read_loop_state(&ctx).await {
            Some(state) => (state.index, state.items),
            None => (0, None),
        };
        let items = match carried_items {
            Some(items) => items,
            None => self.resolve_items(&ctx).await?,
        };

        if let Some(break_if) = ctx.config.get("break_if").map(|v| v.coerce_string()) {
            if evaluate_condition(&break_if, &ctx).await {
                ctx.trace.info(format!("Loop break at index {index}"));
                return Ok(ExecutionResult::loop_break(
                    done,
                    LoopState::new(index).with_items(items),
                ));
            }
        }

        if index >= items.len() {
            ctx.trace
                .info(format!("Loop complete after {} items", items.len()));
            return Ok(ExecutionResult::loop_end(
                done,
                LoopState::new(index).with_items(items),
            ));
        }

        let item = items[index].clone();
        let next_state = LoopState::new(index + 1).with_items(items);

        if let Some(continue_if) = ctx.config.get("continue_if").map(|v| v.coerce_string()) {
            ctx.write("item", item.clone()).await;
            if evaluate_condition(&continue_if, &ctx).await {
                ctx.trace.info(format!("Skipping item at index {index}"));
                return Ok(ExecutionResult::loop_continue(next_state));
            }
        }

        Ok(ExecutionResult::loop_next(body, next_state)
            .with_output("item", item)
            .with_output("index", index))
    }
}

/// Condition-driven `while` loop. Each dispatch re-evaluates the condition:
/// true yields `LOOP_NEXT` with the iteration count advanced, false yields
/// `LOOP_END`. A `max_iterations` guard (default 1000) breaks runaway loops.
pub struct WhileLoopExecutor;

#[async_trait]
impl NodeExecutor for WhileLoopExecutor {
    fn identifier(&self) -> &str {
        "control.while"
    }

    async fn validate_runtime(
        &self,
        _def: &NodeDefinition,
        ctx: &ExecutionContext,
    ) -> ValidationResult {
        let mut validation = ValidationResult::pass();
        match ctx.config.get("condition").and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => {}
            _ => validation.add_failure("'condition' must be a non-empty string"),
        }
        if ctx.config.get("next").is_none() {
            validation.add_failure("'next' (loop body node key) is required");
        }
        if ctx.config.get("done").is_none() {
            validation.add_failure("'done' (post-loop node key) is required");
        }
        validation
    }

    async fn execute(&self, ctx: Arc<ExecutionContext>) -> Result<ExecutionResult, ExecutorError> {
        let condition = ctx.require_config("condition")?.coerce_string();
        let body = ctx.require_config("next")?.coerce_string();
        let done = ctx.require_config("done")?.coerce_string();
        let max_iterations = ctx
            .config
            .get("max_iterations")
            .and_then(|v| v.coerce_f64())
            .map(|n| n as usize)
            .unwrap_or(1000);

        let state = read_loop_state(&ctx).await.unwrap_or(LoopState::new(0));

        if state.index >= max_iterations {
            ctx.trace.warn(format!(
                "Loop exceeded {max_iterations} iterations; breaking"
            ));
            return Ok(ExecutionResult::loop_break(done, state));
        }

        if evaluate_condition(&condition, &ctx).await {
            Ok(ExecutionResult::loop_next(body, LoopState::new(state.index + 1))
                .with_output("iteration", state.index))
        } else {
            Ok(ExecutionResult::loop_end(done, state))
        }
    }
}
