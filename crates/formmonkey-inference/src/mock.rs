//! Mock model provider for deterministic testing.
//!
//! ```rust,ignore
//! let provider = MockModelProvider::new()
//!     .with_field(party_field("Party A", "Globex"))
//!     .with_latency_ms(10);
//! let fields = provider.predict("text", None).await.unwrap();
//! assert_eq!(provider.call_count(), 1);
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use formmonkey_core::{Error, FieldType, ModelField, ModelProvider, Result};

/// Mock model provider for testing.
#[derive(Clone)]
pub struct MockModelProvider {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    name: String,
    fields: Vec<ModelField>,
    latency_ms: u64,
    fail: bool,
    healthy: bool,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub text: String,
    pub document_type: Option<String>,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            fields: Vec::new(),
            latency_ms: 0,
            fail: false,
            healthy: true,
        }
    }
}

/// A model field with the given name, type, value and confidence.
pub fn model_field(name: &str, field_type: FieldType, value: &str, confidence: f32) -> ModelField {
    ModelField {
        id: None,
        name: name.to_string(),
        field_type,
        value: value.to_string(),
        confidence,
        page: None,
        bounding_box: None,
    }
}

impl MockModelProvider {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).name = name.into();
        self
    }

    /// Add a field returned by every prediction.
    pub fn with_field(mut self, field: ModelField) -> Self {
        Arc::make_mut(&mut self.config).fields.push(field);
        self
    }

    /// Set simulated latency for every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Make every prediction fail with `ProviderUnavailable`.
    pub fn with_failure(mut self) -> Self {
        let config = Arc::make_mut(&mut self.config);
        config.fail = true;
        config.healthy = false;
        self
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn predict(&self, text: &str, document_type: Option<&str>) -> Result<Vec<ModelField>> {
        self.call_log.lock().unwrap().push(MockCall {
            text: text.to_string(),
            document_type: document_type.map(str::to_string),
            timestamp: std::time::Instant::now(),
        });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.fail {
            return Err(Error::ProviderUnavailable(format!(
                "{}: simulated failure",
                self.config.name
            )));
        }

        Ok(self.config.fields.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_fields_and_logs_calls() {
        let provider = MockModelProvider::new().with_field(model_field(
            "Party A",
            FieldType::Party,
            "Globex",
            0.95,
        ));
        let fields = provider.predict("text", Some("NDA")).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.get_calls()[0].document_type.as_deref(), Some("NDA"));
        assert!(provider.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let provider = MockModelProvider::new().with_failure();
        assert!(matches!(
            provider.predict("text", None).await,
            Err(Error::ProviderUnavailable(_))
        ));
        assert!(!provider.health_check().await.unwrap());
    }
}
