use crate::pipeline::{DecoratorPipeline, DispatchRoute};
use crate::registry::ExecutorRegistry;
use crate::tasks::{TaskHandle, TaskRegistry};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use taskcore::{EngineError, ExecutionResult, ExecutionTaskEnvelope, PolicyResolver, TaskId};
use tokio::sync::oneshot;

/// Resolves with the dispatch outcome once the worker completes.
pub struct ExecutionFuture {
    task_id: TaskId,
    rx: oneshot::Receiver<Result<ExecutionResult, EngineError>>,
}

impl ExecutionFuture {
    fn pending(task_id: TaskId) -> (oneshot::Sender<Result<ExecutionResult, EngineError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { task_id, rx })
    }

    /// A future that is already resolved, for dispatches rejected up front.
    fn resolved(task_id: TaskId, outcome: Result<ExecutionResult, EngineError>) -> Self {
        let (tx, fut) = Self::pending(task_id);
        let _ = tx.send(outcome);
        fut
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }
}

impl Future for ExecutionFuture {
    type Output = Result<ExecutionResult, EngineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(EngineError::ChannelClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Accepts dispatch requests, registers them for cancellation, runs the
/// decorated pipeline on a spawned worker and resolves the future with the
/// `ExecutionResult`.
pub struct ExecutionGateway {
    registry: Arc<ExecutorRegistry>,
    pipeline: Arc<DecoratorPipeline>,
    tasks: Arc<TaskRegistry>,
    policies: Arc<dyn PolicyResolver>,
}

impl ExecutionGateway {
    pub fn new(
        registry: Arc<ExecutorRegistry>,
        pipeline: Arc<DecoratorPipeline>,
        tasks: Arc<TaskRegistry>,
        policies: Arc<dyn PolicyResolver>,
    ) -> Self {
        Self {
            registry,
            pipeline,
            tasks,
            policies,
        }
    }

    pub fn tasks(&self) -> &Arc<TaskRegistry> {
        &self.tasks
    }

    /// Dispatch one node execution. The returned future resolves with the
    /// normalized result; it fails immediately for an unknown executor or a
    /// task id that is already in flight.
    pub async fn execute_async(&self, envelope: ExecutionTaskEnvelope) -> ExecutionFuture {
        let task_id = envelope.task_id;

        let executor = match self.registry.lookup(&envelope.definition.executor_identifier) {
            Some(executor) => executor,
            None => {
                return ExecutionFuture::resolved(
                    task_id,
                    Err(EngineError::UnknownExecutor(
                        envelope.definition.executor_identifier.clone(),
                    )),
                );
            }
        };

        let policy = self
            .policies
            .resolve(&envelope.definition, &envelope.context);

        let handle = TaskHandle::new(
            task_id,
            envelope.definition.node_key.clone(),
            envelope.context.cancellation.clone(),
        );
        let handle = match self.tasks.register(handle).await {
            Ok(handle) => handle,
            Err(e) => return ExecutionFuture::resolved(task_id, Err(e)),
        };

        let route = DispatchRoute {
            task_id,
            executor,
            definition: Arc::new(envelope.definition),
            policy,
            context: envelope.context,
        };

        let (tx, fut) = ExecutionFuture::pending(task_id);
        let pipeline = self.pipeline.clone();
        let tasks = self.tasks.clone();

        // One lightweight worker per dispatch; executors block on I/O, so a
        // fixed-size pre-allocated pool would deadlock under fan-out.
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = if handle.cancellation.is_cancelled() {
                tracing::debug!(task_id = %task_id, "Task cancelled before execution started");
                Err(EngineError::Cancelled)
            } else {
                match pipeline.dispatch(&route).await {
                    Ok(result) => {
                        tracing::debug!(
                            task_id = %task_id,
                            node = %route.context.node_key,
                            status = ?result.status,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Dispatch completed"
                        );
                        Ok(result)
                    }
                    Err(e) => {
                        // Nothing should get past the exception decorator;
                        // treat this as an engine bug, not a node failure.
                        tracing::error!(
                            task_id = %task_id,
                            node = %route.context.node_key,
                            "Dispatch escaped exception normalization: {e}"
                        );
                        Err(EngineError::Executor(e))
                    }
                }
            };

            // A cancelled caller may have dropped the future; the result is
            // simply discarded in that case.
            let _ = tx.send(outcome);
            tasks.unregister(task_id).await;
        });

        fut
    }

    /// Request cooperative cancellation of an in-flight dispatch. Returns
    /// whether a live task was found. A pipeline that already started runs
    /// to completion in the background; its result is discarded.
    pub async fn cancel_async(&self, envelope: &ExecutionTaskEnvelope) -> bool {
        self.tasks.cancel(envelope.task_id).await
    }
}
