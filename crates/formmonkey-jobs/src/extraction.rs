//! Extraction adapter registry for dispatching documents by format.

use std::collections::HashMap;
use std::sync::Arc;

use formmonkey_core::{DocumentFormat, Error, ExtractionAdapter, Result};

use crate::adapters::{DocxAdapter, PdfTextAdapter};

/// Registry mapping document formats to their adapter implementations.
pub struct ExtractionRegistry {
    adapters: HashMap<DocumentFormat, Arc<dyn ExtractionAdapter>>,
}

impl ExtractionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with the PDF and DOCX adapters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PdfTextAdapter));
        registry.register(Arc::new(DocxAdapter));
        registry
    }

    /// Register an adapter. Replaces any existing adapter for the same format.
    pub fn register(&mut self, adapter: Arc<dyn ExtractionAdapter>) {
        self.adapters.insert(adapter.format(), adapter);
    }

    /// Adapter registered for `format`, or `UnsupportedFormat`.
    pub fn get(&self, format: DocumentFormat) -> Result<Arc<dyn ExtractionAdapter>> {
        self.adapters.get(&format).cloned().ok_or_else(|| {
            Error::UnsupportedFormat(format!("no extraction adapter registered for {}", format))
        })
    }

    /// List all formats that have registered adapters.
    pub fn available_formats(&self) -> Vec<DocumentFormat> {
        self.adapters.keys().copied().collect()
    }

    /// Check if an adapter is registered for the given format.
    pub fn has_adapter(&self, format: DocumentFormat) -> bool {
        self.adapters.contains_key(&format)
    }

    /// Run health checks on all registered adapters.
    pub async fn health_check_all(&self) -> HashMap<DocumentFormat, bool> {
        let mut results = HashMap::new();
        for (format, adapter) in &self.adapters {
            let healthy = adapter.health_check().await.unwrap_or(false);
            results.insert(*format, healthy);
        }
        results
    }
}

impl Default for ExtractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
