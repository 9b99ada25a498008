//! Model provider registry.
//!
//! Providers are registered by name at startup and resolved from the
//! configured `ML_MODEL_TYPE`. Resolving a name nobody registered is a
//! configuration error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use formmonkey_core::{Error, ModelProvider, Result};

use crate::http::{HttpModelProvider, HttpProviderConfig};

/// Default OpenAI-compatible prediction gateway.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default Anthropic prediction gateway.
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1";

/// Registry of named model providers.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from environment variables.
    ///
    /// | Variable | Registers |
    /// |----------|-----------|
    /// | `ML_LOCAL_ENDPOINT` | `local` at that URL |
    /// | `OPENAI_API_KEY` (+ `OPENAI_BASE_URL`) | `openai` |
    /// | `ANTHROPIC_API_KEY` (+ `ANTHROPIC_BASE_URL`) | `anthropic` |
    ///
    /// `timeout_ms` bounds every request of the registered providers.
    pub fn from_env(timeout_ms: u64) -> Result<Self> {
        let mut registry = Self::new();
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = var("ML_LOCAL_ENDPOINT") {
            registry.register(Arc::new(HttpModelProvider::new(
                HttpProviderConfig::new("local", endpoint).with_timeout_ms(timeout_ms),
            )?));
        }

        if let Some(key) = var("OPENAI_API_KEY") {
            let base_url = var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            registry.register(Arc::new(HttpModelProvider::new(
                HttpProviderConfig::new("openai", base_url)
                    .with_api_key(key)
                    .with_timeout_ms(timeout_ms),
            )?));
        }

        if let Some(key) = var("ANTHROPIC_API_KEY") {
            let base_url =
                var("ANTHROPIC_BASE_URL").unwrap_or_else(|| DEFAULT_ANTHROPIC_URL.to_string());
            registry.register(Arc::new(HttpModelProvider::new(
                HttpProviderConfig::new("anthropic", base_url)
                    .with_api_key(key)
                    .with_timeout_ms(timeout_ms),
            )?));
        }

        debug!(providers = ?registry.provider_ids(), "Model provider registry built");
        Ok(registry)
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        info!(provider = provider.name(), "Registering model provider");
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ModelProvider>> {
        self.providers.get(name).cloned().ok_or_else(|| {
            Error::Config(format!(
                "Unknown model provider '{}' (registered: {})",
                name,
                match self.provider_ids() {
                    ids if ids.is_empty() => "none".to_string(),
                    ids => ids.join(", "),
                }
            ))
        })
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, sorted.
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockModelProvider;

    #[test]
    fn test_register_and_resolve() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(MockModelProvider::new().with_name("local")))
            .with_provider(Arc::new(MockModelProvider::new().with_name("openai")));

        assert_eq!(registry.len(), 2);
        assert!(registry.has_provider("local"));
        assert_eq!(registry.provider_ids(), vec!["local", "openai"]);
        assert_eq!(registry.resolve("openai").unwrap().name(), "openai");
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry =
            ProviderRegistry::new().with_provider(Arc::new(MockModelProvider::new()));
        let err = registry.resolve("remote-c").err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("remote-c"));
        assert!(err.to_string().contains("mock"));

        let empty = ProviderRegistry::new();
        assert!(empty.is_empty());
        assert!(empty.resolve("local").err().unwrap().to_string().contains("none"));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(MockModelProvider::new().with_name("local")));
        registry.register(Arc::new(MockModelProvider::new().with_name("local")));
        assert_eq!(registry.len(), 1);
    }
}
