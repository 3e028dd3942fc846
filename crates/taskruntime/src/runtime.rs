use crate::gateway::{ExecutionFuture, ExecutionGateway};
use crate::pipeline::DecoratorPipeline;
use crate::registry::ExecutorRegistry;
use crate::resource::ResourceHub;
use crate::tasks::TaskRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskcore::{
    Backoff, DefaultPolicyResolver, ExecutionContext, ExecutionTaskEnvelope, PolicyResolver,
    ResolvedExecutionPolicy, RunId, TraceBus, TraceEvent, Value, WorkflowId,
};

/// Engine-wide settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// When set, error results carry internal failure detail.
    #[serde(default)]
    pub debug: bool,
    pub trace_buffer_size: usize,
    pub default_timeout_ms: u64,
    pub default_max_attempts: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            trace_buffer_size: 1000,
            default_timeout_ms: 30_000,
            default_max_attempts: 1,
        }
    }
}

/// Facade wiring the registry, decorator pipeline, task registry, resource
/// hub and trace bus into one engine the graph walker talks to.
pub struct EngineRuntime {
    registry: Arc<ExecutorRegistry>,
    gateway: Arc<ExecutionGateway>,
    tasks: Arc<TaskRegistry>,
    trace: Arc<TraceBus>,
    resources: Arc<ResourceHub>,
}

impl EngineRuntime {
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self::with_config(registry, ResourceHub::builder().build(), RuntimeConfig::default())
    }

    pub fn with_config(
        registry: ExecutorRegistry,
        resources: Arc<ResourceHub>,
        config: RuntimeConfig,
    ) -> Self {
        let policies: Arc<dyn PolicyResolver> =
            Arc::new(DefaultPolicyResolver::new(ResolvedExecutionPolicy {
                timeout: Duration::from_millis(config.default_timeout_ms),
                max_attempts: config.default_max_attempts,
                backoff: Backoff::None,
            }));
        Self::with_policy_resolver(registry, resources, policies, config)
    }

    /// Full wiring for callers supplying their own policy resolver.
    pub fn with_policy_resolver(
        registry: ExecutorRegistry,
        resources: Arc<ResourceHub>,
        policies: Arc<dyn PolicyResolver>,
        config: RuntimeConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        let tasks = Arc::new(TaskRegistry::new());
        let pipeline = Arc::new(DecoratorPipeline::standard(config.debug));
        let gateway = Arc::new(ExecutionGateway::new(
            registry.clone(),
            pipeline,
            tasks.clone(),
            policies,
        ));
        let trace = Arc::new(TraceBus::new(config.trace_buffer_size));

        Self {
            registry,
            gateway,
            tasks,
            trace,
            resources,
        }
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<ExecutionGateway> {
        &self.gateway
    }

    pub fn tasks(&self) -> &Arc<TaskRegistry> {
        &self.tasks
    }

    pub fn resources(&self) -> &Arc<ResourceHub> {
        &self.resources
    }

    /// Build an execution context wired to this runtime's resource hub and
    /// trace bus. The walker calls this once per dispatch.
    pub fn context(
        &self,
        workflow_id: WorkflowId,
        run_id: RunId,
        node_key: impl Into<String>,
        config: HashMap<String, Value>,
    ) -> Arc<ExecutionContext> {
        let node_key = node_key.into();
        let trace = self.trace.emitter(workflow_id, run_id, node_key.clone());
        Arc::new(ExecutionContext::new(
            workflow_id,
            run_id,
            node_key,
            config,
            self.resources.clone(),
            trace,
        ))
    }

    pub async fn execute_async(&self, envelope: ExecutionTaskEnvelope) -> ExecutionFuture {
        self.gateway.execute_async(envelope).await
    }

    pub async fn cancel_async(&self, envelope: &ExecutionTaskEnvelope) -> bool {
        self.gateway.cancel_async(envelope).await
    }

    pub fn subscribe_trace(&self) -> tokio::sync::broadcast::Receiver<TraceEvent> {
        self.trace.subscribe()
    }
}
