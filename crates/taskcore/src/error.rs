use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy surfaced on `ExecutionResult`s.
///
/// `Validation` is resolved inside the pipeline before the executor runs;
/// `Retriable` conditions are re-attempted per policy before surfacing;
/// everything else is terminal for the dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Retriable,
    Interrupted,
    NonRetriable,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Retriable => "RETRIABLE",
            ErrorKind::Interrupted => "INTERRUPTED",
            ErrorKind::NonRetriable => "NON_RETRIABLE",
        };
        f.write_str(s)
    }
}

/// Failures raised by executors and resource acquisition during a dispatch.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Execution interrupted")]
    Interrupted,

    #[error("Timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}

impl ExecutorError {
    /// Whether the resilience layer may re-attempt after this failure.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ExecutorError::Timeout { .. } | ExecutorError::Io(_))
    }

    /// Classification used by the exception-normalization decorator.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::Interrupted => ErrorKind::Interrupted,
            ExecutorError::Timeout { .. } | ExecutorError::Io(_) => ErrorKind::Retriable,
            _ => ErrorKind::NonRetriable,
        }
    }
}

impl From<std::io::Error> for ExecutorError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                ExecutorError::Timeout {
                    elapsed: Duration::ZERO,
                }
            }
            _ => ExecutorError::Io(e.to_string()),
        }
    }
}

/// Failures inside a resource manager.
#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    #[error("Failed to create resource for key '{key}': {reason}")]
    CreateFailed { key: String, reason: String },

    #[error("No resource entry for key: {0}")]
    UnknownKey(String),

    #[error("No resource manager registered for: {0}")]
    UnknownManager(String),
}

/// Failures at the gateway boundary. A dispatch should essentially never
/// raise past the gateway; these cover the cases where it legitimately can.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Task already dispatched: {0}")]
    DuplicateTask(uuid::Uuid),

    #[error("Unknown executor identifier: {0}")]
    UnknownExecutor(String),

    #[error("Dispatch cancelled before execution started")]
    Cancelled,

    #[error("Execution channel closed before a result was produced")]
    ChannelClosed,

    #[error("Executor failure escaped normalization: {0}")]
    Executor(#[from] ExecutorError),
}
