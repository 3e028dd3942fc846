use async_trait::async_trait;
use std::time::Duration;
use taskcore::{ResourceError, Value};
use taskruntime::ResourceFactory;

/// Pooled HTTP client factory. N nodes configured against the same origin
/// and credential collapse onto one `reqwest::Client` (one connection
/// pool), keyed by `client_key`.
pub struct HttpClientFactory {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Logical identity of a client: request origin plus credential.
pub fn client_key(url: &str, auth_token: Option<&str>) -> String {
    let origin = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => &url[..scheme_end + 3 + path_start],
                None => url,
            }
        }
        None => url,
    };
    match auth_token {
        Some(token) => format!("{origin}#{token}"),
        None => origin.to_string(),
    }
}

#[async_trait]
impl ResourceFactory for HttpClientFactory {
    type Resource = reqwest::Client;

    async fn create_resource(
        &self,
        key: &str,
        config: &Value,
    ) -> Result<reqwest::Client, ResourceError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout);

        if let Value::Object(config) = config {
            if let Some(timeout_ms) = config.get("timeout_ms").and_then(|v| v.coerce_f64()) {
                builder = builder.timeout(Duration::from_millis(timeout_ms as u64));
            }
            if let Some(token) = config.get("auth_token").and_then(|v| v.as_str()) {
                let mut headers = reqwest::header::HeaderMap::new();
                let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| ResourceError::CreateFailed {
                        key: key.to_string(),
                        reason: format!("invalid auth token: {e}"),
                    })?;
                headers.insert(reqwest::header::AUTHORIZATION, value);
                builder = builder.default_headers(headers);
            }
        }

        builder.build().map_err(|e| ResourceError::CreateFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn cleanup_resource(&self, _resource: &reqwest::Client) {
        // Dropping the client closes its connection pool.
        tracing::debug!("Releasing pooled HTTP client");
    }
}
