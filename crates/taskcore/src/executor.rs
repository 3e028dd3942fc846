use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::policy::RetryPolicy;
use crate::result::ExecutionResult;
use crate::value::Value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Broad category of an executor, carried on the dispatch envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorType {
    Action,
    Control,
    Trigger,
    Integration,
}

/// The per-node slice of a workflow definition this engine needs:
/// identity, executor routing, config snapshot and policy overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub node_key: String,
    pub executor_identifier: String,
    pub executor_type: ExecutorType,
    pub config: HashMap<String, Value>,
    pub timeout_ms: Option<u64>,
    pub retry_policy: Option<RetryPolicy>,
}

impl NodeDefinition {
    pub fn new(node_key: impl Into<String>, executor_identifier: impl Into<String>) -> Self {
        Self {
            node_key: node_key.into(),
            executor_identifier: executor_identifier.into(),
            executor_type: ExecutorType::Action,
            config: HashMap::new(),
            timeout_ms: None,
            retry_policy: None,
        }
    }

    pub fn with_type(mut self, executor_type: ExecutorType) -> Self {
        self.executor_type = executor_type;
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, delay_ms: u64) -> Self {
        self.retry_policy = Some(RetryPolicy {
            max_attempts,
            delay_ms,
            backoff_multiplier: 1.0,
        });
        self
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

/// Outcome of definition or runtime validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    failures: Vec<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            failures: vec![message.into()],
        }
    }

    pub fn add_failure(&mut self, message: impl Into<String>) {
        self.failures.push(message.into());
    }

    pub fn is_passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

/// The unit of work a node performs.
///
/// Executors read their config and working memory through the context, may
/// borrow pooled resources for the duration of the call only, and return one
/// `ExecutionResult` per invocation. Retries, timeouts and asynchrony are the
/// runtime's concern, not the executor's.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Stable identifier the registry routes on (e.g. "control.if").
    fn identifier(&self) -> &str;

    async fn execute(&self, ctx: Arc<ExecutionContext>) -> Result<ExecutionResult, ExecutorError>;

    /// Optional: structural checks against the definition at load time.
    fn validate_definition(&self, _def: &NodeDefinition) -> ValidationResult {
        ValidationResult::pass()
    }

    /// Optional: checks against the resolved config and live context,
    /// run by the validation decorator before every execution.
    async fn validate_runtime(
        &self,
        _def: &NodeDefinition,
        _ctx: &ExecutionContext,
    ) -> ValidationResult {
        ValidationResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_builder() {
        let def = NodeDefinition::new("n1", "control.if")
            .with_type(ExecutorType::Control)
            .with_config("condition", "1==1")
            .with_timeout_ms(5000)
            .with_retry(2, 100);
        assert_eq!(def.config_str("condition"), Some("1==1"));
        assert_eq!(def.timeout_ms, Some(5000));
        assert_eq!(def.retry_policy.as_ref().map(|r| r.max_attempts), Some(2));
    }

    #[test]
    fn validation_accumulates_failures() {
        let mut v = ValidationResult::pass();
        assert!(v.is_passed());
        v.add_failure("missing url");
        v.add_failure("bad method");
        assert!(!v.is_passed());
        assert_eq!(v.failures().len(), 2);
    }
}
