use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskcore::{
    EngineError, ErrorKind, ExecutionContext, ExecutionResult, ExecutionStatus,
    ExecutionTaskEnvelope, ExecutorError, NodeDefinition, NodeExecutor, OutputMap,
    ValidationResult,
};
use taskruntime::{EngineRuntime, ExecutorRegistry, RuntimeConfig};
use uuid::Uuid;

/// Succeeds after an optional delay, counting invocations.
struct SleepyExecutor {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

#[async_trait]
impl NodeExecutor for SleepyExecutor {
    fn identifier(&self) -> &str {
        "test.sleepy"
    }

    async fn execute(
        &self,
        _ctx: Arc<ExecutionContext>,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(ExecutionResult::success(OutputMap::new()))
    }
}

/// Always fails runtime validation; executing it would be a bug.
struct UnvalidatableExecutor {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl NodeExecutor for UnvalidatableExecutor {
    fn identifier(&self) -> &str {
        "test.unvalidatable"
    }

    async fn validate_runtime(
        &self,
        _def: &NodeDefinition,
        _ctx: &ExecutionContext,
    ) -> ValidationResult {
        ValidationResult::fail("config is never acceptable")
    }

    async fn execute(
        &self,
        _ctx: Arc<ExecutionContext>,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutionResult::success(OutputMap::new()))
    }
}

/// Raises a fixed failure on every attempt.
struct RaisingExecutor {
    identifier: &'static str,
    make_error: fn() -> ExecutorError,
}

#[async_trait]
impl NodeExecutor for RaisingExecutor {
    fn identifier(&self) -> &str {
        self.identifier
    }

    async fn execute(
        &self,
        _ctx: Arc<ExecutionContext>,
    ) -> Result<ExecutionResult, ExecutorError> {
        Err((self.make_error)())
    }
}

/// Fails with a transient error until the configured attempt succeeds.
struct FlakyExecutor {
    calls: Arc<AtomicUsize>,
    succeed_on_attempt: usize,
}

#[async_trait]
impl NodeExecutor for FlakyExecutor {
    fn identifier(&self) -> &str {
        "test.flaky"
    }

    async fn execute(
        &self,
        _ctx: Arc<ExecutionContext>,
    ) -> Result<ExecutionResult, ExecutorError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < self.succeed_on_attempt {
            Err(ExecutorError::Io("connection reset".to_string()))
        } else {
            Ok(ExecutionResult::success(OutputMap::new()).with_output("attempt", attempt))
        }
    }
}

fn runtime_with(executors: Vec<Arc<dyn NodeExecutor>>) -> EngineRuntime {
    let mut registry = ExecutorRegistry::new();
    for executor in executors {
        registry.register(executor);
    }
    EngineRuntime::new(registry)
}

fn envelope_for(runtime: &EngineRuntime, identifier: &str) -> ExecutionTaskEnvelope {
    let definition = NodeDefinition::new("n1", identifier);
    let context = runtime.context(Uuid::new_v4(), Uuid::new_v4(), "n1", Default::default());
    ExecutionTaskEnvelope::new(definition, context)
}

async fn wait_for_drain(runtime: &EngineRuntime) {
    for _ in 0..100 {
        if runtime.tasks().is_empty().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task registry did not drain");
}

#[tokio::test]
async fn duplicate_task_id_fails_second_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = runtime_with(vec![Arc::new(SleepyExecutor {
        calls: calls.clone(),
        delay: Duration::from_millis(200),
    })]);

    let first = envelope_for(&runtime, "test.sleepy");
    let second = first.clone();

    let first_fut = runtime.execute_async(first).await;
    let second_fut = runtime.execute_async(second).await;

    assert!(matches!(
        second_fut.await,
        Err(EngineError::DuplicateTask(_))
    ));

    let result = first_fut.await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn same_task_id_allowed_after_completion() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = runtime_with(vec![Arc::new(SleepyExecutor {
        calls: calls.clone(),
        delay: Duration::ZERO,
    })]);

    let envelope = envelope_for(&runtime, "test.sleepy");
    runtime.execute_async(envelope.clone()).await.await.unwrap();
    wait_for_drain(&runtime).await;
    runtime.execute_async(envelope).await.await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn validation_failure_never_reaches_executor() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = runtime_with(vec![Arc::new(UnvalidatableExecutor {
        calls: calls.clone(),
    })]);

    let envelope = envelope_for(&runtime, "test.unvalidatable");
    let result = runtime.execute_async(envelope).await.await.unwrap();

    assert_eq!(result.status, ExecutionStatus::ValidationError);
    assert_eq!(result.error_kind, Some(ErrorKind::Validation));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn timeout_flavored_failure_maps_to_retry() {
    let runtime = runtime_with(vec![Arc::new(RaisingExecutor {
        identifier: "test.timeout",
        make_error: || ExecutorError::Timeout {
            elapsed: Duration::from_millis(5),
        },
    })]);

    let result = runtime
        .execute_async(envelope_for(&runtime, "test.timeout"))
        .await
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Retry);
    assert_eq!(result.error_kind, Some(ErrorKind::Retriable));
}

#[tokio::test]
async fn arbitrary_failure_maps_to_non_retriable_error() {
    let runtime = runtime_with(vec![Arc::new(RaisingExecutor {
        identifier: "test.bug",
        make_error: || ExecutorError::ExecutionFailed("logic bug".to_string()),
    })]);

    let result = runtime
        .execute_async(envelope_for(&runtime, "test.bug"))
        .await
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error_kind, Some(ErrorKind::NonRetriable));
    assert!(result.error_message.is_some());
    assert!(result.output.is_empty());
}

#[tokio::test]
async fn interruption_maps_to_interrupted_error() {
    let runtime = runtime_with(vec![Arc::new(RaisingExecutor {
        identifier: "test.interrupted",
        make_error: || ExecutorError::Interrupted,
    })]);

    let result = runtime
        .execute_async(envelope_for(&runtime, "test.interrupted"))
        .await
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error_kind, Some(ErrorKind::Interrupted));
}

#[tokio::test]
async fn retries_are_invisible_to_the_caller() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = runtime_with(vec![Arc::new(FlakyExecutor {
        calls: calls.clone(),
        succeed_on_attempt: 3,
    })]);

    let definition = NodeDefinition::new("n1", "test.flaky").with_retry(3, 1);
    let context = runtime.context(Uuid::new_v4(), Uuid::new_v4(), "n1", Default::default());
    let envelope = ExecutionTaskEnvelope::new(definition, context);

    let result = runtime.execute_async(envelope).await.await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_the_final_retry_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = runtime_with(vec![Arc::new(FlakyExecutor {
        calls: calls.clone(),
        succeed_on_attempt: 10,
    })]);

    let definition = NodeDefinition::new("n1", "test.flaky").with_retry(2, 1);
    let context = runtime.context(Uuid::new_v4(), Uuid::new_v4(), "n1", Default::default());
    let envelope = ExecutionTaskEnvelope::new(definition, context);

    let result = runtime.execute_async(envelope).await.await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Retry);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn slow_attempt_hits_the_policy_timeout() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = runtime_with(vec![Arc::new(SleepyExecutor {
        calls: calls.clone(),
        delay: Duration::from_secs(10),
    })]);

    let definition = NodeDefinition::new("n1", "test.sleepy").with_timeout_ms(50);
    let context = runtime.context(Uuid::new_v4(), Uuid::new_v4(), "n1", Default::default());
    let envelope = ExecutionTaskEnvelope::new(definition, context);

    let result = runtime.execute_async(envelope).await.await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Retry);
}

#[tokio::test]
async fn cancelled_before_start_never_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = runtime_with(vec![Arc::new(SleepyExecutor {
        calls: calls.clone(),
        delay: Duration::ZERO,
    })]);

    let envelope = envelope_for(&runtime, "test.sleepy");
    envelope.context.cancellation.cancel();

    let outcome = runtime.execute_async(envelope).await.await;
    assert!(matches!(outcome, Err(EngineError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancel_async_reports_whether_a_task_was_found() {
    let runtime = runtime_with(vec![Arc::new(SleepyExecutor {
        calls: Arc::new(AtomicUsize::new(0)),
        delay: Duration::from_millis(200),
    })]);

    let envelope = envelope_for(&runtime, "test.sleepy");
    let fut = runtime.execute_async(envelope.clone()).await;
    assert!(runtime.cancel_async(&envelope).await);
    let _ = fut.await;
    wait_for_drain(&runtime).await;
    assert!(!runtime.cancel_async(&envelope).await);
}

#[tokio::test]
async fn unknown_executor_fails_immediately() {
    let runtime = runtime_with(vec![]);
    let envelope = envelope_for(&runtime, "test.missing");
    let outcome = runtime.execute_async(envelope).await.await;
    assert!(matches!(outcome, Err(EngineError::UnknownExecutor(_))));
}

#[tokio::test]
async fn debug_flag_attaches_failure_detail() {
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(RaisingExecutor {
        identifier: "test.bug",
        make_error: || ExecutorError::ExecutionFailed("boom".to_string()),
    }));
    let runtime = EngineRuntime::with_config(
        registry,
        taskruntime::ResourceHub::builder().build(),
        RuntimeConfig {
            debug: true,
            ..RuntimeConfig::default()
        },
    );

    let result = runtime
        .execute_async(envelope_for(&runtime, "test.bug"))
        .await
        .await
        .unwrap();
    let message = result.error_message.unwrap();
    assert!(message.contains("ExecutionFailed"), "got: {message}");
}
