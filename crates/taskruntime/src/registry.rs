use std::collections::HashMap;
use std::sync::Arc;
use taskcore::{NodeDefinition, NodeExecutor, ValidationResult};

/// Registry of available executors, keyed by stable string identifier.
///
/// Populated once at startup; lookups are plain map reads. There is no
/// runtime plugin discovery.
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor under its own identifier.
    pub fn register(&mut self, executor: Arc<dyn NodeExecutor>) {
        let identifier = executor.identifier().to_string();
        tracing::info!("Registering executor: {}", identifier);
        self.executors.insert(identifier, executor);
    }

    pub fn lookup(&self, identifier: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(identifier).cloned()
    }

    /// Structural validation of a definition against its executor,
    /// for callers loading workflow definitions.
    pub fn validate_definition(&self, def: &NodeDefinition) -> ValidationResult {
        match self.executors.get(&def.executor_identifier) {
            Some(executor) => executor.validate_definition(def),
            None => ValidationResult::fail(format!(
                "Unknown executor identifier: {}",
                def.executor_identifier
            )),
        }
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.executors.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
