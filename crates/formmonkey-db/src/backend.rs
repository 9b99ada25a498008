//! Durable job backend seam used by [`crate::HybridJobStore`].

use async_trait::async_trait;

use formmonkey_core::{Error, Job, JobFilter, Result};

/// A SCAN that failed part-way through.
#[derive(Debug)]
pub struct ScanError {
    /// Pages successfully read before the failure.
    pub pages_read: usize,
    /// Cursor that was being requested when the failure happened.
    pub cursor: u64,
    pub source: Error,
}

/// Key-value persistence for job records with backend-managed expiry.
///
/// Errors for which [`Error::is_recoverable_storage`] holds make the hybrid
/// store fall back to memory; any other error is propagated.
#[async_trait]
pub trait DurableJobBackend: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Write a record unconditionally, refreshing its expiry.
    async fn put(&self, job: &Job) -> Result<()>;

    /// Overwrite a record only if it still exists.
    ///
    /// Returns `false` when the record is gone, in which case nothing is written.
    async fn replace(&self, job: &Job) -> Result<bool>;

    async fn get(&self, job_id: &str) -> Result<Option<Job>>;

    /// Returns whether a record was removed.
    async fn delete(&self, job_id: &str) -> Result<bool>;

    /// Every record matching `filter`, in no particular order.
    async fn scan(&self, filter: &JobFilter) -> std::result::Result<Vec<Job>, ScanError>;
}
