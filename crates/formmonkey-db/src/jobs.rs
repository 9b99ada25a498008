//! Job store with a durable backend and in-memory fallback.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use formmonkey_core::{Error, Job, JobFilter, JobStore, JobUpdate, Result};

use crate::backend::{DurableJobBackend, ScanError};
use crate::config::StoreConfig;
use crate::memory::{order_and_limit, MemoryJobStore};
use crate::redis_store::RedisJobStore;

/// Job store that prefers a durable backend and falls back to memory per operation.
///
/// Recoverable durable-backend errors are logged at WARN and the operation
/// is retried against the in-memory map, so single-key callers never see a
/// storage error. A record written to memory during an outage shadows the
/// durable copy until it is written back on the next read. `list` fails
/// closed if the backend drops out mid-scan.
pub struct HybridJobStore {
    durable: RwLock<Option<Arc<dyn DurableJobBackend>>>,
    memory: MemoryJobStore,
    retention: chrono::Duration,
}

/// Where the freshest copy of a job currently lives.
enum Located {
    Durable(Job),
    Memory(Job),
    Missing,
}

impl Located {
    fn into_job(self) -> Option<Job> {
        match self {
            Located::Durable(job) | Located::Memory(job) => Some(job),
            Located::Missing => None,
        }
    }
}

impl HybridJobStore {
    /// Memory-only store.
    pub fn in_memory(retention: chrono::Duration) -> Self {
        Self {
            durable: RwLock::new(None),
            memory: MemoryJobStore::new(),
            retention,
        }
    }

    /// Store backed by an already connected durable backend.
    pub fn with_durable(durable: Arc<dyn DurableJobBackend>, retention: chrono::Duration) -> Self {
        Self {
            durable: RwLock::new(Some(durable)),
            memory: MemoryJobStore::new(),
            retention,
        }
    }

    /// Build the store from configuration.
    ///
    /// An unreachable Redis server is logged and the store runs memory-only.
    pub async fn connect(config: &StoreConfig) -> Self {
        if !config.use_redis {
            info!("Job store using in-memory backend (USE_REDIS=false)");
            return Self::in_memory(config.retention());
        }

        match RedisJobStore::connect(&config.redis_url, config.ttl_seconds()).await {
            Ok(durable) => Self::with_durable(Arc::new(durable), config.retention()),
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, job store using in-memory backend");
                Self::in_memory(config.retention())
            }
        }
    }

    /// Name of the active primary backend.
    pub async fn backend_name(&self) -> &'static str {
        match self.durable.read().await.as_ref() {
            Some(durable) => durable.name(),
            None => "memory",
        }
    }

    /// The in-memory fallback map.
    pub fn memory(&self) -> &MemoryJobStore {
        &self.memory
    }

    /// Drop the durable connection. Later operations use memory only.
    pub async fn close(&self) {
        if let Some(durable) = self.durable.write().await.take() {
            info!(backend = durable.name(), "Durable job store connection closed");
        }
    }

    /// Sweep in-memory records older than the configured retention window.
    pub async fn sweep_expired(&self) -> usize {
        self.memory.sweep_before(Utc::now() - self.retention).await
    }

    async fn durable(&self) -> Option<Arc<dyn DurableJobBackend>> {
        self.durable.read().await.clone()
    }

    fn degraded(op: &str, job_id: Option<&str>, error: &Error) {
        warn!(
            op,
            job_id = job_id.unwrap_or_default(),
            error = %error,
            "Durable job store degraded, using in-memory fallback"
        );
    }

    /// Find the freshest copy of a job, reconciling the two maps.
    ///
    /// When both hold the job the later `updated_at` wins. A newer memory
    /// copy is written back to the durable backend and dropped from memory;
    /// an older one is discarded.
    async fn locate(&self, durable: &dyn DurableJobBackend, job_id: &str) -> Result<Located> {
        let shadow = self.memory.get(job_id).await?;
        let stored = match durable.get(job_id).await {
            Ok(stored) => stored,
            Err(e) if e.is_recoverable_storage() => {
                Self::degraded("get", Some(job_id), &e);
                return Ok(shadow.map_or(Located::Missing, Located::Memory));
            }
            Err(e) => return Err(e),
        };

        match (stored, shadow) {
            (None, None) => Ok(Located::Missing),
            (None, Some(shadow)) => Ok(Located::Memory(shadow)),
            (Some(stored), None) => Ok(Located::Durable(stored)),
            (Some(stored), Some(shadow)) if shadow.updated_at > stored.updated_at => {
                match durable.replace(&shadow).await {
                    Ok(true) => {
                        self.memory.remove(job_id).await;
                        debug!(job_id, "Wrote fallback job copy back to durable store");
                        Ok(Located::Durable(shadow))
                    }
                    Ok(false) => {
                        // Deleted from the durable store while we were reading.
                        self.memory.remove(job_id).await;
                        Ok(Located::Missing)
                    }
                    Err(e) if e.is_recoverable_storage() => {
                        Self::degraded("reconcile", Some(job_id), &e);
                        Ok(Located::Memory(shadow))
                    }
                    Err(e) => Err(e),
                }
            }
            (Some(stored), Some(_)) => {
                self.memory.remove(job_id).await;
                Ok(Located::Durable(stored))
            }
        }
    }
}

#[async_trait]
impl JobStore for HybridJobStore {
    async fn put(&self, mut job: Job) -> Result<Job> {
        job.validate()?;
        job.touch();

        if let Some(durable) = self.durable().await {
            match durable.put(&job).await {
                Ok(()) => {
                    // Drop any copy written during an earlier outage.
                    self.memory.remove(&job.job_id).await;
                    return Ok(job);
                }
                Err(e) if e.is_recoverable_storage() => {
                    Self::degraded("put", Some(&job.job_id), &e)
                }
                Err(e) => return Err(e),
            }
        }

        self.memory.insert(job.clone()).await;
        Ok(job)
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        match self.durable().await {
            Some(durable) => Ok(self.locate(durable.as_ref(), job_id).await?.into_job()),
            None => self.memory.get(job_id).await,
        }
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Job> {
        let not_found = || Error::NotFound(format!("job {}", job_id));
        let Some(durable) = self.durable().await else {
            return self.memory.update(job_id, update).await;
        };

        let mut job = match self.locate(durable.as_ref(), job_id).await? {
            Located::Durable(job) => job,
            Located::Memory(_) => return self.memory.update(job_id, update).await,
            Located::Missing => return Err(not_found()),
        };
        job.apply(update)?;

        match durable.replace(&job).await {
            Ok(true) => Ok(job),
            Ok(false) => {
                debug!(job_id, "Job deleted while an update was in flight");
                Err(not_found())
            }
            Err(e) if e.is_recoverable_storage() => {
                Self::degraded("update", Some(job_id), &e);
                self.memory.insert(job.clone()).await;
                Ok(job)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        let mut existed = false;
        if let Some(durable) = self.durable().await {
            match durable.delete(job_id).await {
                Ok(removed) => existed = removed,
                Err(e) if e.is_recoverable_storage() => {
                    Self::degraded("delete", Some(job_id), &e)
                }
                Err(e) => return Err(e),
            }
        }
        let in_memory = self.memory.remove(job_id).await;
        Ok(existed || in_memory)
    }

    async fn list(&self, filter: &JobFilter, limit: usize) -> Result<Vec<Job>> {
        let mut merged: HashMap<String, Job> = self
            .memory
            .matching(filter)
            .await
            .into_iter()
            .map(|job| (job.job_id.clone(), job))
            .collect();

        if let Some(durable) = self.durable().await {
            match durable.scan(filter).await {
                Ok(jobs) => {
                    for job in jobs {
                        match merged.get(&job.job_id) {
                            Some(shadow) if shadow.updated_at > job.updated_at => {}
                            _ => {
                                merged.insert(job.job_id.clone(), job);
                            }
                        }
                    }
                }
                Err(ScanError {
                    pages_read: 0,
                    source,
                    ..
                }) if source.is_recoverable_storage() => Self::degraded("list", None, &source),
                Err(ScanError {
                    pages_read: 0,
                    source,
                    ..
                }) => return Err(source),
                Err(ScanError {
                    pages_read,
                    cursor,
                    source,
                }) => {
                    return Err(Error::StorageDegraded(format!(
                        "job listing aborted at SCAN cursor {} after {} page(s): {}",
                        cursor, pages_read, source
                    )))
                }
            }
        }

        Ok(order_and_limit(merged.into_values().collect(), limit))
    }

    async fn expire_older_than(&self, max_age: chrono::Duration) -> Result<usize> {
        // Durable records expire through their TTL; only the fallback map needs a sweep.
        Ok(self.memory.sweep_before(Utc::now() - max_age).await)
    }
}
