//! HTTP model provider.
//!
//! Speaks a small JSON contract:
//!
//! ```text
//! POST {base_url}/predict   {"text": "...", "document_type": "..."}
//!   -> 200 {"fields": [{"name", "type", "value", "confidence", "page"?, "position"?}]}
//! GET  {base_url}/health    -> 2xx when ready
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use formmonkey_core::defaults::ML_TIMEOUT_MS;
use formmonkey_core::{Error, ModelField, ModelProvider, Result};

/// Configuration for an HTTP model provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Name the provider is registered under (e.g. "local", "openai").
    pub name: String,
    /// Base URL; `/predict` and `/health` are appended.
    pub base_url: String,
    /// Bearer token, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl HttpProviderConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: None,
            timeout_ms: ML_TIMEOUT_MS,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_type: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    fields: Vec<ModelField>,
}

/// Model provider backed by an HTTP prediction service.
pub struct HttpModelProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl HttpModelProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            provider = %config.name,
            base_url = %config.base_url,
            "Initializing HTTP model provider"
        );

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn unavailable(&self, detail: impl std::fmt::Display) -> Error {
        Error::ProviderUnavailable(format!("{}: {}", self.config.name, detail))
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn predict(&self, text: &str, document_type: Option<&str>) -> Result<Vec<ModelField>> {
        debug!(
            provider = %self.config.name,
            chars = text.len(),
            document_type = document_type.unwrap_or("-"),
            "Requesting model prediction"
        );

        let mut request = self
            .client
            .post(self.url("/predict"))
            .json(&PredictRequest {
                text,
                document_type,
            });
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.unavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.unavailable(format!("returned {}: {}", status, body.trim())));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("invalid response body: {}", e)))?;

        debug!(
            provider = %self.config.name,
            field_count = parsed.fields.len(),
            "Model prediction received"
        );
        Ok(parsed.fields)
    }

    async fn health_check(&self) -> Result<bool> {
        let mut request = self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5));
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!(provider = %self.config.name, status = %resp.status(), "Model provider health check failed");
                Ok(false)
            }
            Err(e) => {
                warn!(provider = %self.config.name, error = %e, "Model provider health check error");
                Ok(false)
            }
        }
    }
}
