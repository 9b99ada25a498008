//! Field prediction engine.
//!
//! Order of precedence:
//!
//! 1. The configured model provider, bounded by a timeout. Any failure is
//!    logged and absorbed.
//! 2. Rule-based detection, skipping field names the provider supplied.
//! 3. Profile enrichment, when a profile is given.
//! 4. Document type: the caller's, else keyword classification.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use formmonkey_core::defaults::{ML_MODEL_TYPE, ML_TIMEOUT_MS};
use formmonkey_core::{
    Error, FieldPrediction, ModelProvider, PredictionResponse, Result, UserProfile,
};

use crate::document_type;
use crate::enrichment;
use crate::provider::ProviderRegistry;
use crate::rules;

/// Configuration for the prediction engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionConfig {
    /// Call the model provider before rule-based detection.
    pub ml_enabled: bool,
    /// Registered provider name to use.
    pub model_type: String,
    /// Upper bound on one provider call.
    pub timeout_ms: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            ml_enabled: false,
            model_type: ML_MODEL_TYPE.to_string(),
            timeout_ms: ML_TIMEOUT_MS,
        }
    }
}

impl PredictionConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ML_ENABLED` | `false` | Call the model provider |
    /// | `ML_MODEL_TYPE` | `local` | Provider name in the registry |
    /// | `ML_TIMEOUT_MS` | `5000` | Provider call timeout |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ml_enabled: std::env::var("ML_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.ml_enabled),
            model_type: std::env::var("ML_MODEL_TYPE")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.model_type),
            timeout_ms: std::env::var("ML_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.timeout_ms),
        }
    }

    pub fn with_model(mut self, model_type: impl Into<String>) -> Self {
        self.ml_enabled = true;
        self.model_type = model_type.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.ml_enabled = enabled;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }
}

/// Predicts typed fields from extracted document text.
#[derive(Clone)]
pub struct PredictionEngine {
    provider: Option<Arc<dyn ModelProvider>>,
    timeout: Duration,
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::rules_only()
    }
}

impl PredictionEngine {
    /// Engine that only runs rule-based detection.
    pub fn rules_only() -> Self {
        Self {
            provider: None,
            timeout: Duration::from_millis(ML_TIMEOUT_MS),
        }
    }

    /// Engine that consults `provider` first.
    pub fn with_provider(provider: Arc<dyn ModelProvider>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// Build from config, resolving the provider in `registry` when enabled.
    ///
    /// An enabled config naming an unregistered provider is a `Config` error.
    pub fn from_config(config: &PredictionConfig, registry: &ProviderRegistry) -> Result<Self> {
        if !config.ml_enabled {
            info!("Model provider disabled, using rule-based prediction");
            return Ok(Self::rules_only());
        }
        let provider = registry.resolve(&config.model_type)?;
        info!(
            provider = provider.name(),
            timeout_ms = config.timeout_ms,
            "Prediction engine using model provider"
        );
        Ok(Self::with_provider(
            provider,
            Duration::from_millis(config.timeout_ms),
        ))
    }

    /// Name of the configured provider, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.name())
    }

    /// Predict fields for `text`.
    ///
    /// Provider trouble never fails the call. Empty text yields no fields but
    /// still a resolved document type.
    pub async fn predict(
        &self,
        text: &str,
        profile: Option<&UserProfile>,
        document_type: Option<&str>,
    ) -> PredictionResponse {
        let start = Instant::now();
        let resolved_type = document_type::resolve(text, document_type);

        if text.trim().is_empty() {
            debug!(document_type = %resolved_type, "Empty text, no fields predicted");
            return response(Vec::new(), resolved_type, None);
        }

        let (mut fields, provider) = match self.model_fields(text, document_type).await {
            Some((name, fields)) => (fields, Some(name)),
            None => (Vec::new(), None),
        };

        let supplied: HashSet<String> = fields.iter().map(|f| f.name.clone()).collect();
        let rule_fields: Vec<FieldPrediction> = rules::detect_fields(text)
            .into_iter()
            .filter(|f| !supplied.contains(&f.name))
            .collect();
        debug!(
            model_fields = fields.len(),
            rule_fields = rule_fields.len(),
            "Detection finished"
        );
        fields.extend(rule_fields);

        if let Some(profile) = profile {
            enrichment::enrich(&mut fields, profile, &resolved_type);
        }

        info!(
            document_type = %resolved_type,
            field_count = fields.len(),
            provider = provider.as_deref().unwrap_or("-"),
            duration_ms = start.elapsed().as_millis() as u64,
            "Prediction completed"
        );
        response(fields, resolved_type, provider)
    }

    /// Provider fields, deduplicated by name. `None` when there is no
    /// provider, it failed, or it returned nothing.
    async fn model_fields(
        &self,
        text: &str,
        document_type: Option<&str>,
    ) -> Option<(String, Vec<FieldPrediction>)> {
        let provider = self.provider.as_ref()?;
        let name = provider.name().to_string();

        let outcome = match tokio::time::timeout(self.timeout, provider.predict(text, document_type))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::ProviderUnavailable(format!(
                "{}: timed out after {}ms",
                name,
                self.timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(raw) => {
                let mut seen = HashSet::new();
                let fields: Vec<FieldPrediction> = raw
                    .into_iter()
                    .map(|f| f.into_prediction())
                    .filter(|f| seen.insert(f.name.clone()))
                    .collect();
                if fields.is_empty() {
                    debug!(provider = %name, "Model provider returned no fields");
                    return None;
                }
                Some((name, fields))
            }
            Err(e) => {
                warn!(
                    provider = %name,
                    error = %e,
                    "Model provider unavailable, falling back to rule-based detection"
                );
                None
            }
        }
    }
}

fn response(
    fields: Vec<FieldPrediction>,
    document_type: String,
    provider: Option<String>,
) -> PredictionResponse {
    PredictionResponse {
        count: fields.len(),
        fields,
        document_type,
        provider,
        timestamp: Utc::now(),
    }
}
