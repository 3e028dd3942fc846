use crate::error::ErrorKind;
use crate::executor::ValidationResult;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered output map carried on results.
pub type OutputMap = IndexMap<String, Value>;

/// Status taxonomy every node execution resolves to.
///
/// This is the wire contract between the engine and the graph walker;
/// renaming or removing a variant is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Error,
    Retry,
    Waiting,
    Next,
    Commit,
    Uncommit,
    ValidationError,
    LoopNext,
    LoopBreak,
    LoopContinue,
    LoopEnd,
}

/// Loop working state handed back to the walker on every `Loop*` result.
///
/// Loop executors never keep iteration state in process fields; the walker
/// persists this value and feeds it into the next dispatch's context, so
/// each call derives "am I done" purely from data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    /// Next index to visit (for loops) or completed iteration count (while loops).
    pub index: usize,
    /// Snapshot of the iterated collection, when the loop owns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Value>>,
}

impl LoopState {
    pub fn new(index: usize) -> Self {
        Self { index, items: None }
    }

    pub fn with_items(mut self, items: Vec<Value>) -> Self {
        self.items = Some(items);
        self
    }
}

/// Immutable outcome value produced by every node execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// Produced data; empty (never null) when the status carries none.
    #[serde(default)]
    pub output: OutputMap,
    /// Node to run next; set by `Next` and all `Loop*` statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Ordered human-readable trace lines.
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_state: Option<LoopState>,
}

impl ExecutionResult {
    fn bare(status: ExecutionStatus) -> Self {
        Self {
            status,
            output: OutputMap::new(),
            next_node_key: None,
            error_kind: None,
            error_message: None,
            logs: Vec::new(),
            loop_state: None,
        }
    }

    pub fn success(output: OutputMap) -> Self {
        Self {
            output,
            ..Self::bare(ExecutionStatus::Success)
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error_kind: Some(kind),
            error_message: Some(message.into()),
            ..Self::bare(ExecutionStatus::Error)
        }
    }

    pub fn retry(message: impl Into<String>) -> Self {
        Self {
            error_kind: Some(ErrorKind::Retriable),
            error_message: Some(message.into()),
            ..Self::bare(ExecutionStatus::Retry)
        }
    }

    /// Suspends the branch until an external event resumes it; no next node.
    pub fn waiting() -> Self {
        Self::bare(ExecutionStatus::Waiting)
    }

    pub fn next_node(key: impl Into<String>) -> Self {
        Self {
            next_node_key: Some(key.into()),
            ..Self::bare(ExecutionStatus::Next)
        }
    }

    pub fn commit(output: OutputMap) -> Self {
        Self {
            output,
            ..Self::bare(ExecutionStatus::Commit)
        }
    }

    /// Rolls back a pending commit and suspends the branch; no next node.
    pub fn uncommit() -> Self {
        Self::bare(ExecutionStatus::Uncommit)
    }

    pub fn loop_next(key: impl Into<String>, state: LoopState) -> Self {
        Self {
            next_node_key: Some(key.into()),
            loop_state: Some(state),
            ..Self::bare(ExecutionStatus::LoopNext)
        }
    }

    pub fn loop_break(key: impl Into<String>, state: LoopState) -> Self {
        Self {
            next_node_key: Some(key.into()),
            loop_state: Some(state),
            ..Self::bare(ExecutionStatus::LoopBreak)
        }
    }

    pub fn loop_continue(state: LoopState) -> Self {
        Self {
            loop_state: Some(state),
            ..Self::bare(ExecutionStatus::LoopContinue)
        }
    }

    pub fn loop_end(key: impl Into<String>, state: LoopState) -> Self {
        Self {
            next_node_key: Some(key.into()),
            loop_state: Some(state),
            ..Self::bare(ExecutionStatus::LoopEnd)
        }
    }

    pub fn validation_error(validation: &ValidationResult, node_key: &str) -> Self {
        Self {
            error_kind: Some(ErrorKind::Validation),
            error_message: Some(validation.failures().join("; ")),
            logs: vec![format!("Runtime validation failed for node '{}'", node_key)],
            ..Self::bare(ExecutionStatus::ValidationError)
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output.insert(key.into(), value.into());
        self
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Error | ExecutionStatus::ValidationError
        )
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::LoopNext
                | ExecutionStatus::LoopBreak
                | ExecutionStatus::LoopContinue
                | ExecutionStatus::LoopEnd
        )
    }

    /// Whether the walker should suspend this branch until resumed externally.
    pub fn is_suspending(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Waiting | ExecutionStatus::Uncommit
        )
    }
}
