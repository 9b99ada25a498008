//! # formmonkey-inference
//!
//! Field prediction and preference learning for FormMonkey.
//!
//! - [`PredictionEngine`]: model provider first (bounded by a timeout, with
//!   rule-based fallback), then rule-based matchers, then profile enrichment
//!   and document type classification.
//! - [`ProviderRegistry`]: named model providers resolved from configuration.
//! - [`HttpModelProvider`]: JSON-over-HTTP provider implementation.
//! - [`PreferenceLearner`]: correction scoring and ranked suggestions.
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::from_env(config.timeout_ms)?;
//! let engine = PredictionEngine::from_config(&PredictionConfig::from_env(), &registry)?;
//! let response = engine.predict(&job.content, profile.as_ref(), None).await;
//! ```

pub mod document_type;
pub mod enrichment;
pub mod http;
pub mod preferences;
pub mod prediction;
pub mod provider;
pub mod rules;

// Mock model provider for testing
#[cfg(test)]
pub mod mock;

// Re-export core types
pub use formmonkey_core::*;

pub use http::{HttpModelProvider, HttpProviderConfig};
pub use prediction::{PredictionConfig, PredictionEngine};
pub use preferences::PreferenceLearner;
pub use provider::ProviderRegistry;
