use crate::client_pool::{client_key, HttpClientFactory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskcore::{
    ExecutionContext, ExecutionResult, ExecutorError, NodeDefinition, NodeExecutor, OutputMap,
    ResourceError, ValidationResult, Value,
};
use taskruntime::ResourceManager;

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// HTTP request executor. Borrows its client from the pooled
/// `HttpClientFactory` manager for the duration of the call.
pub struct HttpRequestExecutor;

#[async_trait]
impl NodeExecutor for HttpRequestExecutor {
    fn identifier(&self) -> &str {
        "http.request"
    }

    async fn validate_runtime(
        &self,
        _def: &NodeDefinition,
        ctx: &ExecutionContext,
    ) -> ValidationResult {
        let mut validation = ValidationResult::pass();
        match ctx.config.get("url").and_then(|v| v.as_str()) {
            Some(url) if !url.trim().is_empty() => {}
            _ => validation.add_failure("'url' must be a non-empty string"),
        }
        let method = ctx
            .get_config_or("method", Value::from("GET"))
            .coerce_string()
            .to_uppercase();
        if !METHODS.contains(&method.as_str()) {
            validation.add_failure(format!("unsupported method: {method}"));
        }
        validation
    }

    async fn execute(&self, ctx: Arc<ExecutionContext>) -> Result<ExecutionResult, ExecutorError> {
        let url = ctx.require_config("url")?.coerce_string();
        let method = ctx
            .get_config_or("method", Value::from("GET"))
            .coerce_string()
            .to_uppercase();

        let manager = ctx
            .resource::<ResourceManager<HttpClientFactory>>()
            .ok_or_else(|| {
                ExecutorError::Resource(ResourceError::UnknownManager(
                    "HttpClientFactory".to_string(),
                ))
            })?;

        let auth_token = ctx.config.get("auth_token").map(|v| v.coerce_string());
        let key = client_key(&url, auth_token.as_deref());
        let client_config = Value::Object(ctx.config.clone());
        let client = manager.get_or_create(&key, &client_config).await?;

        ctx.trace.info(format!("{method} {url}"));
        let outcome = perform(&client, &method, &url, &ctx).await;
        // The borrow never outlives the call.
        let _ = manager.release(&key).await;

        let (status, body, headers) = outcome?;
        ctx.trace.info(format!("Response status: {status}"));

        Ok(ExecutionResult::success(OutputMap::new())
            .with_output("status", status as f64)
            .with_output("body", body)
            .with_output("headers", Value::Object(headers)))
    }
}

async fn perform(
    client: &reqwest::Client,
    method: &str,
    url: &str,
    ctx: &ExecutionContext,
) -> Result<(u16, String, HashMap<String, Value>), ExecutorError> {
    let mut request = match method {
        "GET" => client.get(url),
        "POST" => client.post(url),
        "PUT" => client.put(url),
        "PATCH" => client.patch(url),
        "DELETE" => client.delete(url),
        _ => {
            return Err(ExecutorError::InvalidConfig(format!(
                "Unsupported method: {method}"
            )))
        }
    };

    if let Some(body) = ctx.config.get("body") {
        request = match body {
            Value::Json(json) => request.json(json),
            other => request.body(other.coerce_string()),
        };
    }
    if let Some(Value::Object(headers)) = ctx.config.get("headers") {
        for (name, value) in headers {
            request = request.header(name, value.coerce_string());
        }
    }

    let response = request.send().await.map_err(map_reqwest_error)?;
    let status = response.status().as_u16();
    let headers: HashMap<String, Value> = response
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                Value::String(v.to_str().unwrap_or("").to_string()),
            )
        })
        .collect();
    let body = response.text().await.map_err(map_reqwest_error)?;

    Ok((status, body, headers))
}

/// Transient network conditions become retriable failures; everything else
/// is terminal.
fn map_reqwest_error(e: reqwest::Error) -> ExecutorError {
    if e.is_timeout() {
        ExecutorError::Timeout {
            elapsed: Duration::ZERO,
        }
    } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
        ExecutorError::Io(e.to_string())
    } else {
        ExecutorError::ExecutionFailed(e.to_string())
    }
}
