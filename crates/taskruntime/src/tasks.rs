use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use taskcore::{EngineError, TaskId};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Bookkeeping for one in-flight dispatch.
pub struct TaskHandle {
    pub task_id: TaskId,
    pub node_key: String,
    pub cancellation: CancellationToken,
    pub registered_at: DateTime<Utc>,
}

impl TaskHandle {
    pub fn new(task_id: TaskId, node_key: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            task_id,
            node_key: node_key.into(),
            cancellation,
            registered_at: Utc::now(),
        }
    }
}

/// Tracks in-flight executions by task id so they can be cancelled or found.
///
/// Registration is the idempotency guard: at most one pipeline execution is
/// ever in flight for a given task id.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<TaskHandle>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Atomically register a task; a second registration for the same id
    /// fails with `DuplicateTask`.
    pub async fn register(&self, handle: TaskHandle) -> Result<Arc<TaskHandle>, EngineError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&handle.task_id) {
            return Err(EngineError::DuplicateTask(handle.task_id));
        }
        let handle = Arc::new(handle);
        tasks.insert(handle.task_id, handle.clone());
        Ok(handle)
    }

    pub async fn unregister(&self, task_id: TaskId) -> Option<Arc<TaskHandle>> {
        self.tasks.write().await.remove(&task_id)
    }

    pub async fn get(&self, task_id: TaskId) -> Option<Arc<TaskHandle>> {
        self.tasks.read().await.get(&task_id).cloned()
    }

    /// Request cooperative cancellation; returns whether a live task was found.
    pub async fn cancel(&self, task_id: TaskId) -> bool {
        match self.get(task_id).await {
            Some(handle) => {
                tracing::info!(task_id = %task_id, node = %handle.node_key, "Cancelling task");
                handle.cancellation.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let registry = TaskRegistry::new();
        let id = Uuid::new_v4();
        registry
            .register(TaskHandle::new(id, "n1", CancellationToken::new()))
            .await
            .unwrap();
        let second = registry
            .register(TaskHandle::new(id, "n1", CancellationToken::new()))
            .await;
        assert!(matches!(second, Err(EngineError::DuplicateTask(_))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn cancel_reports_presence() {
        let registry = TaskRegistry::new();
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        registry
            .register(TaskHandle::new(id, "n1", token.clone()))
            .await
            .unwrap();

        assert!(registry.cancel(id).await);
        assert!(token.is_cancelled());
        registry.unregister(id).await;
        assert!(!registry.cancel(id).await);
    }
}
