//! Core traits for FormMonkey abstractions.
//!
//! These traits define the seams between the pipeline and its backends:
//! job storage, profile storage, document extractors and model providers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::*;

// =============================================================================
// JOB STORE
// =============================================================================

/// Keyed persistence of job records with a retention window.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace a job. Returns the stored record (with refreshed
    /// `updated_at`).
    async fn put(&self, job: Job) -> Result<Job>;

    /// Get job by ID.
    async fn get(&self, job_id: &str) -> Result<Option<Job>>;

    /// Get job by ID, failing with `NotFound` when absent.
    async fn fetch(&self, job_id: &str) -> Result<Job> {
        self.get(job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }

    /// Apply a partial update through the job state machine.
    ///
    /// Fails with `NotFound` when the job is absent; never creates one.
    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Job>;

    /// Delete a job. Returns whether it existed.
    async fn delete(&self, job_id: &str) -> Result<bool>;

    /// List jobs matching `filter`, oldest first, at most `limit`.
    async fn list(&self, filter: &JobFilter, limit: usize) -> Result<Vec<Job>>;

    /// Drop jobs whose `updated_at` is older than `max_age`. Returns the
    /// number of records removed by this call.
    async fn expire_older_than(&self, max_age: chrono::Duration) -> Result<usize>;
}

// =============================================================================
// PROFILE STORE
// =============================================================================

/// In-place profile mutation. Returns whether the profile changed.
pub type ProfileMutation<'a> = Box<dyn FnOnce(&mut UserProfile) -> bool + Send + 'a>;

/// Persistence of user profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Get profile by user ID.
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Insert or replace a profile.
    async fn save(&self, profile: &UserProfile) -> Result<()>;

    /// Atomically load (or create) the profile, apply `mutation` and persist
    /// it when the mutation reports a change. Concurrent updates for the same
    /// user must not lose each other's writes. A profile created for a
    /// mutation that changed nothing is not stored.
    async fn update(&self, user_id: &str, mutation: ProfileMutation<'_>) -> Result<bool>;
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Receives extractor progress and answers cancellation checks.
///
/// Implementations must not block: extractors call `report` from inside
/// page loops and blocking parser threads.
pub trait ProgressSink: Send + Sync {
    /// `done` of `total` units processed.
    fn report(&self, done: usize, total: usize, message: Option<&str>);

    /// Whether the job behind this sink is gone and work should stop.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Sink that drops every report.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _done: usize, _total: usize, _message: Option<&str>) {}
}

/// Adapter for turning one document format into raw text.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// The document format this adapter handles.
    fn format(&self) -> DocumentFormat;

    /// Extract text from raw file data.
    async fn extract(
        &self,
        data: Vec<u8>,
        filename: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ExtractedText>;

    /// Check if the adapter's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this adapter.
    fn name(&self) -> &str;
}

// =============================================================================
// MODEL PROVIDER
// =============================================================================

/// Pluggable field-prediction backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Registry name of this provider.
    fn name(&self) -> &str;

    /// Predict fields for a document's text.
    async fn predict(&self, text: &str, document_type: Option<&str>) -> Result<Vec<ModelField>>;

    /// Check if the provider is reachable.
    async fn health_check(&self) -> Result<bool>;
}
