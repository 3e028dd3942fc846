use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;
pub type WorkflowId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Info,
    Warn,
    Error,
}

/// One structured trace line, keyed by workflow/run/node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub node_key: String,
    pub level: TraceLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Handle a single dispatch uses to emit trace lines.
#[derive(Clone)]
pub struct TraceEmitter {
    workflow_id: WorkflowId,
    run_id: RunId,
    node_key: String,
    sender: broadcast::Sender<TraceEvent>,
}

impl TraceEmitter {
    pub fn new(
        workflow_id: WorkflowId,
        run_id: RunId,
        node_key: String,
        sender: broadcast::Sender<TraceEvent>,
    ) -> Self {
        Self {
            workflow_id,
            run_id,
            node_key,
            sender,
        }
    }

    /// Emitter with no subscribers, for contexts built outside a runtime.
    pub fn disconnected(node_key: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(1);
        Self::new(Uuid::nil(), Uuid::nil(), node_key.into(), sender)
    }

    pub fn emit(&self, level: TraceLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            TraceLevel::Info => tracing::info!(node = %self.node_key, "{message}"),
            TraceLevel::Warn => tracing::warn!(node = %self.node_key, "{message}"),
            TraceLevel::Error => tracing::error!(node = %self.node_key, "{message}"),
        }
        // Lossy on purpose: a slow subscriber never blocks execution.
        let _ = self.sender.send(TraceEvent {
            workflow_id: self.workflow_id,
            run_id: self.run_id,
            node_key: self.node_key.clone(),
            level,
            message,
            timestamp: Utc::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(TraceLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(TraceLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(TraceLevel::Error, message);
    }
}

/// Process-wide trace bus the runtime publishes dispatch trace lines to.
pub struct TraceBus {
    sender: broadcast::Sender<TraceEvent>,
}

impl TraceBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.sender.subscribe()
    }

    pub fn emitter(
        &self,
        workflow_id: WorkflowId,
        run_id: RunId,
        node_key: impl Into<String>,
    ) -> TraceEmitter {
        TraceEmitter::new(workflow_id, run_id, node_key.into(), self.sender.clone())
    }
}
