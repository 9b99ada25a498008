//! # formmonkey-jobs
//!
//! Document extraction for FormMonkey.
//!
//! This crate provides:
//! - PDF (poppler) and DOCX (docx-rs) extraction adapters
//! - A progress writer that keeps job progress monotonic
//! - The extraction pipeline driving a job to `Completed` or `Failed`
//! - A background worker running pipelines concurrently
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use formmonkey_db::{HybridJobStore, StoreConfig};
//! use formmonkey_jobs::{ExtractionRequest, WorkerBuilder, WorkerConfig};
//!
//! let store = Arc::new(HybridJobStore::connect(&StoreConfig::from_env()).await);
//! let handle = WorkerBuilder::new(store)
//!     .with_config(WorkerConfig::from_env())
//!     .build()
//!     .start();
//!
//! handle.submit(ExtractionRequest::for_upload("/uploads/lease.pdf", "user-1")).await?;
//!
//! // Listen for events
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod adapters;
pub mod extraction;
pub mod pipeline;
pub mod progress;
pub mod worker;

// Re-export core types
pub use formmonkey_core::*;

pub use adapters::{DocxAdapter, PdfTextAdapter};
pub use extraction::ExtractionRegistry;
pub use pipeline::{ExtractionPipeline, PipelineConfig};
pub use progress::{ChannelProgress, ProgressWriter};
pub use worker::{
    ExtractionRequest, JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle,
};
