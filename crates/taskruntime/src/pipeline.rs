use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use taskcore::{
    ErrorKind, ExecutionContext, ExecutionResult, ExecutorError, NodeDefinition, NodeExecutor,
    ResolvedExecutionPolicy, TaskId,
};

pub const VALIDATION_ORDER: i32 = 0;
pub const RESILIENCE_ORDER: i32 = 50;
pub const EXCEPTION_ORDER: i32 = 100;

pub type InvocationFuture =
    Pin<Box<dyn Future<Output = Result<ExecutionResult, ExecutorError>> + Send>>;

/// A zero-argument invocation of the (possibly wrapped) executor. It is a
/// factory rather than a one-shot future so the resilience layer can
/// re-invoke it for retries.
pub type Invocation = Arc<dyn Fn() -> InvocationFuture + Send + Sync>;

/// Everything resolved for one dispatch: executor, definition snapshot,
/// policy and context. Immutable for the lifetime of the dispatch.
#[derive(Clone)]
pub struct DispatchRoute {
    pub task_id: TaskId,
    pub executor: Arc<dyn NodeExecutor>,
    pub definition: Arc<NodeDefinition>,
    pub policy: ResolvedExecutionPolicy,
    pub context: Arc<ExecutionContext>,
}

/// A cross-cutting wrapper composed around an executor invocation.
///
/// Order semantics: the pipeline folds decorators in ascending `order`, so
/// a higher order ends up as a more outer wrapper (invoked earlier). The
/// exception-normalization decorator uses the highest order so it observes
/// failures raised by every inner layer.
pub trait ExecutionDecorator: Send + Sync {
    fn order(&self) -> i32;

    fn decorate(&self, inner: Invocation, route: &DispatchRoute) -> Invocation;
}

/// Ordered chain of decorators, built once at startup.
pub struct DecoratorPipeline {
    decorators: Vec<Arc<dyn ExecutionDecorator>>,
}

impl DecoratorPipeline {
    pub fn new(mut decorators: Vec<Arc<dyn ExecutionDecorator>>) -> Self {
        decorators.sort_by_key(|d| d.order());
        Self { decorators }
    }

    /// The standard chain: validation, resilience, exception normalization.
    pub fn standard(debug: bool) -> Self {
        Self::new(vec![
            Arc::new(ValidationDecorator),
            Arc::new(ResilienceDecorator),
            Arc::new(ExceptionDecorator::new(debug)),
        ])
    }

    /// Compose the full invocation for a route, innermost first.
    pub fn assemble(&self, route: &DispatchRoute) -> Invocation {
        let executor = route.executor.clone();
        let context = route.context.clone();
        let mut invocation: Invocation = Arc::new(move || {
            let executor = executor.clone();
            let context = context.clone();
            Box::pin(async move { executor.execute(context).await }) as InvocationFuture
        });
        for decorator in &self.decorators {
            invocation = decorator.decorate(invocation, route);
        }
        invocation
    }

    pub async fn dispatch(&self, route: &DispatchRoute) -> Result<ExecutionResult, ExecutorError> {
        (self.assemble(route))().await
    }
}

/// Runs the executor's runtime validation; on failure short-circuits to a
/// `VALIDATION_ERROR` result without invoking the inner layers.
pub struct ValidationDecorator;

impl ExecutionDecorator for ValidationDecorator {
    fn order(&self) -> i32 {
        VALIDATION_ORDER
    }

    fn decorate(&self, inner: Invocation, route: &DispatchRoute) -> Invocation {
        let executor = route.executor.clone();
        let definition = route.definition.clone();
        let context = route.context.clone();
        Arc::new(move || {
            let executor = executor.clone();
            let definition = definition.clone();
            let context = context.clone();
            let inner = inner.clone();
            Box::pin(async move {
                let validation = executor.validate_runtime(&definition, &context).await;
                if !validation.is_passed() {
                    context.trace.warn(format!(
                        "Runtime validation failed: {}",
                        validation.failures().join("; ")
                    ));
                    return Ok(ExecutionResult::validation_error(
                        &validation,
                        &context.node_key,
                    ));
                }
                inner().await
            }) as InvocationFuture
        })
    }
}

/// Applies the resolved policy: a hard timeout per attempt and retries with
/// backoff for retriable failures. Each attempt runs on its own spawned
/// task so a stuck attempt cannot hold the dispatch past the timeout; the
/// stuck task is aborted best-effort. Retries are invisible to callers —
/// only the final attempt's outcome surfaces.
pub struct ResilienceDecorator;

impl ExecutionDecorator for ResilienceDecorator {
    fn order(&self) -> i32 {
        RESILIENCE_ORDER
    }

    fn decorate(&self, inner: Invocation, route: &DispatchRoute) -> Invocation {
        let policy = route.policy.clone();
        let trace = route.context.trace.clone();
        Arc::new(move || {
            let inner = inner.clone();
            let policy = policy.clone();
            let trace = trace.clone();
            Box::pin(async move {
                let mut attempt: u32 = 1;
                loop {
                    let mut handle = tokio::spawn(inner());
                    let outcome = match tokio::time::timeout(policy.timeout, &mut handle).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(join_err)) => {
                            if join_err.is_cancelled() {
                                Err(ExecutorError::Interrupted)
                            } else {
                                Err(ExecutorError::ExecutionFailed(format!(
                                    "Attempt panicked: {join_err}"
                                )))
                            }
                        }
                        Err(_) => {
                            handle.abort();
                            Err(ExecutorError::Timeout {
                                elapsed: policy.timeout,
                            })
                        }
                    };

                    match outcome {
                        Ok(result) => return Ok(result),
                        Err(e) if e.is_retriable() && attempt < policy.max_attempts => {
                            let delay = policy.backoff.delay_for(attempt);
                            trace.warn(format!(
                                "Attempt {}/{} failed ({}); retrying in {:?}",
                                attempt, policy.max_attempts, e, delay
                            ));
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }) as InvocationFuture
        })
    }
}

/// The only layer permitted to convert a raised failure into a result
/// value. Classification: interruption maps to `ERROR`/`INTERRUPTED`,
/// timeouts and I/O failures to `RETRY`, everything else to
/// `ERROR`/`NON_RETRIABLE`.
pub struct ExceptionDecorator {
    debug: bool,
}

impl ExceptionDecorator {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ExecutionDecorator for ExceptionDecorator {
    fn order(&self) -> i32 {
        EXCEPTION_ORDER
    }

    fn decorate(&self, inner: Invocation, route: &DispatchRoute) -> Invocation {
        let debug = self.debug;
        let trace = route.context.trace.clone();
        Arc::new(move || {
            let inner = inner.clone();
            let trace = trace.clone();
            Box::pin(async move {
                match inner().await {
                    Ok(result) => Ok(result),
                    Err(e) => {
                        let mut message = e.to_string();
                        if debug {
                            // Internal detail is only attached when the
                            // process-wide debug flag is on.
                            message.push_str(&format!(" [{e:?}]"));
                        }
                        trace.error(format!("Execution failed: {message}"));
                        Ok(match e.kind() {
                            ErrorKind::Interrupted => {
                                ExecutionResult::error(ErrorKind::Interrupted, message)
                            }
                            ErrorKind::Retriable => ExecutionResult::retry(message),
                            _ => ExecutionResult::error(ErrorKind::NonRetriable, message),
                        })
                    }
                }
            }) as InvocationFuture
        })
    }
}
