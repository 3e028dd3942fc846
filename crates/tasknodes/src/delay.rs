use async_trait::async_trait;
use std::sync::Arc;
use taskcore::{
    ExecutionContext, ExecutionResult, ExecutorError, NodeExecutor, OutputMap, Value,
};
use tokio::time::{sleep, Duration};

/// Delay execution for a configured duration, observing cancellation.
pub struct DelayExecutor;

#[async_trait]
impl NodeExecutor for DelayExecutor {
    fn identifier(&self) -> &str {
        "time.delay"
    }

    async fn execute(&self, ctx: Arc<ExecutionContext>) -> Result<ExecutionResult, ExecutorError> {
        let delay_ms = ctx
            .get_config_or("delay_ms", Value::Number(1000.0))
            .coerce_f64()
            .unwrap_or(1000.0) as u64;

        ctx.trace.info(format!("Delaying for {delay_ms}ms"));

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => {}
            _ = ctx.cancellation.cancelled() => return Err(ExecutorError::Interrupted),
        }

        Ok(ExecutionResult::success(OutputMap::new()).with_output("delayed_ms", delay_ms as f64))
    }
}
