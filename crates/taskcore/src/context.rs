use crate::executor::NodeDefinition;
use crate::trace::{RunId, TraceEmitter, WorkflowId};
use crate::value::Value;
use crate::ExecutorError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type TaskId = Uuid;

/// Type-keyed lookup of resource managers, implemented by the runtime's
/// resource hub. Kept as a trait here so executors can borrow pooled
/// resources without this crate depending on the pooling implementation.
pub trait ResourceAccessor: Send + Sync {
    fn get_any(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Accessor with nothing registered, for contexts built outside a runtime.
pub struct NoResources;

impl ResourceAccessor for NoResources {
    fn get_any(&self, _type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}

/// Execution context for one in-flight dispatch.
///
/// The working memory is owned exclusively by this dispatch; it is never
/// shared across concurrent executions of different nodes.
pub struct ExecutionContext {
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub node_key: String,
    /// Static configuration snapshot for this node.
    pub config: HashMap<String, Value>,
    memory: RwLock<HashMap<String, Value>>,
    resources: Arc<dyn ResourceAccessor>,
    pub trace: TraceEmitter,
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(
        workflow_id: WorkflowId,
        run_id: RunId,
        node_key: impl Into<String>,
        config: HashMap<String, Value>,
        resources: Arc<dyn ResourceAccessor>,
        trace: TraceEmitter,
    ) -> Self {
        Self {
            workflow_id,
            run_id,
            node_key: node_key.into(),
            config,
            memory: RwLock::new(HashMap::new()),
            resources,
            trace,
            cancellation: CancellationToken::new(),
        }
    }

    /// Read a working-memory value.
    pub async fn read(&self, key: &str) -> Option<Value> {
        self.memory.read().await.get(key).cloned()
    }

    pub async fn read_str(&self, key: &str) -> Option<String> {
        self.read(key).await.map(|v| v.coerce_string())
    }

    pub async fn read_f64(&self, key: &str) -> Option<f64> {
        self.read(key).await.and_then(|v| v.coerce_f64())
    }

    /// Write a working-memory value, returning any previous one.
    pub async fn write(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.memory.write().await.insert(key.into(), value.into())
    }

    /// Snapshot of the working memory, for tests and trace dumps.
    pub async fn memory_snapshot(&self) -> HashMap<String, Value> {
        self.memory.read().await.clone()
    }

    /// Borrow a typed resource manager from the hub. Executors must release
    /// anything they acquire before returning.
    pub fn resource<M: Any + Send + Sync>(&self) -> Option<Arc<M>> {
        self.resources
            .get_any(TypeId::of::<M>())
            .and_then(|any| any.downcast::<M>().ok())
    }

    pub fn require_config(&self, key: &str) -> Result<&Value, ExecutorError> {
        self.config
            .get(key)
            .ok_or_else(|| ExecutorError::MissingConfig(key.to_string()))
    }

    pub fn get_config_or(&self, key: &str, default: Value) -> Value {
        self.config.get(key).cloned().unwrap_or(default)
    }
}

/// The unit submitted to the execution gateway. Built by the graph walker
/// for a single dispatch; never persisted.
#[derive(Clone)]
pub struct ExecutionTaskEnvelope {
    /// Globally unique per dispatch; cancellation and the duplicate-dispatch
    /// guard key on it.
    pub task_id: TaskId,
    pub definition: NodeDefinition,
    pub context: Arc<ExecutionContext>,
}

impl ExecutionTaskEnvelope {
    pub fn new(definition: NodeDefinition, context: Arc<ExecutionContext>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            definition,
            context,
        }
    }

    pub fn with_task_id(mut self, task_id: TaskId) -> Self {
        self.task_id = task_id;
        self
    }
}
