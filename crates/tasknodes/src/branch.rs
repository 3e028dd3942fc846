use crate::condition::evaluate_condition;
use async_trait::async_trait;
use std::sync::Arc;
use taskcore::{
    ExecutionContext, ExecutionResult, ExecutorError, NodeDefinition, NodeExecutor, OutputMap,
    ValidationResult, Value,
};

/// First node key out of a target config value (single string or array).
fn first_target(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.first().map(|v| v.coerce_string()),
        _ => None,
    }
}

/// Two-way branch: evaluates `condition` and routes to the first key of
/// `next_true` or `next_false`. A condition that fails to evaluate falls
/// through to the false branch; a structurally absent condition is a
/// validation error.
pub struct IfExecutor;

#[async_trait]
impl NodeExecutor for IfExecutor {
    fn identifier(&self) -> &str {
        "control.if"
    }

    fn validate_definition(&self, def: &NodeDefinition) -> ValidationResult {
        match def.config_str("condition") {
            Some(c) if !c.trim().is_empty() => ValidationResult::pass(),
            _ => ValidationResult::fail("'condition' must be a non-empty string"),
        }
    }

    async fn validate_runtime(
        &self,
        _def: &NodeDefinition,
        ctx: &ExecutionContext,
    ) -> ValidationResult {
        match ctx.config.get("condition").and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => ValidationResult::pass(),
            _ => ValidationResult::fail("'condition' must be a non-empty string"),
        }
    }

    async fn execute(&self, ctx: Arc<ExecutionContext>) -> Result<ExecutionResult, ExecutorError> {
        let condition = ctx.require_config("condition")?.coerce_string();
        let matched = evaluate_condition(&condition, &ctx).await;
        ctx.trace
            .info(format!("Condition '{condition}' evaluated to {matched}"));

        let branch = if matched { "next_true" } else { "next_false" };
        match first_target(ctx.config.get(branch)) {
            Some(key) => Ok(ExecutionResult::next_node(key).with_output("matched", matched)),
            None => Ok(ExecutionResult::success(OutputMap::new()).with_output("matched", matched)),
        }
    }
}

/// Multi-case branch: resolves a discriminant expression and routes to the
/// matching entry of `cases`, or to `default`. An unresolvable discriminant
/// takes the default branch.
pub struct SwitchExecutor;

#[async_trait]
impl NodeExecutor for SwitchExecutor {
    fn identifier(&self) -> &str {
        "control.switch"
    }

    async fn validate_runtime(
        &self,
        _def: &NodeDefinition,
        ctx: &ExecutionContext,
    ) -> ValidationResult {
        let mut validation = ValidationResult::pass();
        if ctx.config.get("expression").is_none() {
            validation.add_failure("'expression' is required");
        }
        if !matches!(ctx.config.get("cases"), Some(Value::Object(_))) {
            validation.add_failure("'cases' must be an object of value -> node key");
        }
        validation
    }

    async fn execute(&self, ctx: Arc<ExecutionContext>) -> Result<ExecutionResult, ExecutorError> {
        let expression = ctx.require_config("expression")?.coerce_string();
        let cases = match ctx.require_config("cases")? {
            Value::Object(cases) => cases.clone(),
            _ => {
                return Err(ExecutorError::InvalidConfig(
                    "'cases' must be an object".to_string(),
                ))
            }
        };

        let discriminant = resolve_discriminant(&expression, &ctx).await;
        let target = discriminant
            .as_ref()
            .and_then(|d| cases.get(d))
            .map(|v| v.coerce_string())
            .or_else(|| first_target(ctx.config.get("default")));

        match (discriminant, target) {
            (discriminant, Some(key)) => {
                ctx.trace.info(format!(
                    "Switch on '{expression}' matched '{}' -> {key}",
                    discriminant.as_deref().unwrap_or("<default>")
                ));
                Ok(ExecutionResult::next_node(key)
                    .with_output("case", discriminant.unwrap_or_default()))
            }
            (discriminant, None) => Ok(ExecutionResult::success(OutputMap::new())
                .with_output("case", discriminant.unwrap_or_default())),
        }
    }
}

/// A quoted/plain literal, or a working-memory key. Failures resolve to
/// `None` so the switch takes its default branch.
async fn resolve_discriminant(expression: &str, ctx: &ExecutionContext) -> Option<String> {
    let expression = expression.trim();
    if expression.is_empty() || expression.contains("{{") {
        return None;
    }
    if (expression.starts_with('\'') && expression.ends_with('\''))
        || (expression.starts_with('"') && expression.ends_with('"'))
    {
        return Some(expression[1..expression.len() - 1].to_string());
    }
    if let Some(value) = ctx.read(expression).await {
        return Some(value.coerce_string());
    }
    Some(expression.to_string())
}
