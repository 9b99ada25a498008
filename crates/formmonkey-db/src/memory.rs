//! In-process job store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use formmonkey_core::{Error, Job, JobFilter, JobStore, JobUpdate, Result};

/// Job store backed by a process-local map.
///
/// Used on its own when Redis is disabled and as the fallback path of
/// [`crate::HybridJobStore`]. Expiry requires an explicit sweep.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record as-is, without validation or timestamp refresh.
    pub(crate) async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.job_id.clone(), job);
    }

    pub(crate) async fn remove(&self, job_id: &str) -> bool {
        self.jobs.write().await.remove(job_id).is_some()
    }

    pub(crate) async fn matching(&self, filter: &JobFilter) -> Vec<Job> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect()
    }

    /// Remove jobs last updated before `cutoff`.
    pub async fn sweep_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.updated_at >= cutoff);
        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, cutoff = %cutoff, "Swept expired in-memory jobs");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

/// Sort oldest first, ties by id, and truncate.
pub(crate) fn order_and_limit(mut jobs: Vec<Job>, limit: usize) -> Vec<Job> {
    jobs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
    jobs.truncate(limit);
    jobs
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put(&self, mut job: Job) -> Result<Job> {
        job.validate()?;
        job.touch();
        self.insert(job.clone()).await;
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get(job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        let mut next = current.clone();
        next.apply(update)?;
        jobs.insert(job_id.to_string(), next.clone());
        Ok(next)
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        Ok(self.remove(job_id).await)
    }

    async fn list(&self, filter: &JobFilter, limit: usize) -> Result<Vec<Job>> {
        Ok(order_and_limit(self.matching(filter).await, limit))
    }

    async fn expire_older_than(&self, max_age: chrono::Duration) -> Result<usize> {
        Ok(self.sweep_before(Utc::now() - max_age).await)
    }
}
