//! # formmonkey-core
//!
//! Core types, traits, and abstractions for the FormMonkey document pipeline.
//!
//! This crate provides the data structures (jobs, predictions, profiles) and
//! the trait seams (job store, profile store, extractors, model providers)
//! that the other FormMonkey crates depend on.
//!
//! ## Log levels
//!
//! | Level | Used for |
//! |-------|----------|
//! | ERROR | Job failed, provider misconfigured |
//! | WARN  | Durable store degraded, provider fell back to rules |
//! | INFO  | Job lifecycle transitions, worker start/stop |
//! | DEBUG | Progress ticks, per-family rule match counts |
//! | TRACE | Per-page and per-element extraction detail |
//!
//! Structured fields: `job_id`, `user_id`, `format`, `provider`,
//! `document_type`, `progress`, `duration_ms`.

pub mod defaults;
pub mod error;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{BoxError, Error, Result};
pub use models::*;
pub use traits::*;
