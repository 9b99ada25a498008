//! Redis-backed job records with native TTL.
//!
//! Records are stored as JSON under `job:{job_id}` and expire
//! `JOB_EXPIRATION_HOURS` after their last write.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use formmonkey_core::{defaults, Error, Job, JobFilter, Result};

use crate::backend::{DurableJobBackend, ScanError};

/// Upper bound on establishing the initial connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Durable job backend.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
    prefix: String,
    ttl_seconds: u64,
}

impl RedisJobStore {
    /// Connect to Redis.
    pub async fn connect(url: &str, ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                Error::StorageDegraded(format!(
                    "timed out connecting to Redis after {}s",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })??;
        info!(
            ttl_seconds,
            url = %url.replace(|c: char| c.is_ascii_alphanumeric(), "*"),
            "Redis job store connected"
        );
        Ok(Self {
            conn,
            prefix: defaults::JOB_KEY_PREFIX.to_string(),
            ttl_seconds,
        })
    }

    fn key(&self, job_id: &str) -> String {
        format!("{}{}", self.prefix, job_id)
    }
}

#[async_trait]
impl DurableJobBackend for RedisJobStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn put(&self, job: &Job) -> Result<()> {
        let data = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.key(&job.job_id), data, self.ttl_seconds)
            .await?;
        debug!(job_id = %job.job_id, ttl_seconds = self.ttl_seconds, "Redis SET job");
        Ok(())
    }

    async fn replace(&self, job: &Job) -> Result<bool> {
        let data = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        // SET .. XX answers nil when the key no longer exists.
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(&job.job_id))
            .arg(data)
            .arg("XX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut conn)
            .await?;
        debug!(job_id = %job.job_id, replaced = reply.is_some(), "Redis SET XX job");
        Ok(reply.is_some())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(self.key(job_id)).await?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(self.key(job_id)).await?;
        Ok(removed > 0)
    }

    /// Collect every job matching `filter` with cursor-based SCAN.
    ///
    /// Records that fail to decode are skipped with a warning.
    async fn scan(&self, filter: &JobFilter) -> std::result::Result<Vec<Job>, ScanError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.prefix);
        let mut cursor: u64 = 0;
        let mut pages_read = 0usize;
        let mut jobs = Vec::new();

        loop {
            let fail = |source: Error| ScanError {
                pages_read,
                cursor,
                source,
            };

            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(defaults::JOB_SCAN_PAGE_SIZE)
                .query_async(&mut conn)
                .await
                .map_err(|e| fail(e.into()))?;

            if !keys.is_empty() {
                let values: Vec<Option<String>> = redis::cmd("MGET")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| fail(e.into()))?;

                for (key, value) in keys.iter().zip(values) {
                    let Some(data) = value else { continue };
                    match serde_json::from_str::<Job>(&data) {
                        Ok(job) if filter.matches(&job) => jobs.push(job),
                        Ok(_) => {}
                        Err(e) => warn!(key = %key, error = %e, "Skipping undecodable job record"),
                    }
                }
            }

            pages_read += 1;
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(pages_read, matched = jobs.len(), "Redis SCAN complete");
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| defaults::REDIS_URL.to_string())
    }

    #[tokio::test]
    async fn test_connect_unreachable_is_storage_degraded() {
        let err = RedisJobStore::connect("redis://127.0.0.1:1/0", 60)
            .await
            .err()
            .expect("port 1 is not a Redis server");
        assert!(err.is_recoverable_storage());
    }

    #[tokio::test]
    async fn test_connect_invalid_url() {
        let err = RedisJobStore::connect("not a url", 60)
            .await
            .err()
            .expect("invalid URL");
        assert!(err.is_recoverable_storage());
    }

    #[tokio::test]
    #[ignore = "requires a live Redis server (REDIS_URL)"]
    async fn test_roundtrip_against_live_redis() {
        let store = RedisJobStore::connect(&redis_url(), 60).await.unwrap();
        let job = Job::new("redis-test-job", "redis-user", "/tmp/a.pdf");
        store.put(&job).await.unwrap();

        let fetched = store.get("redis-test-job").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "redis-user");

        let listed = store.scan(&JobFilter::for_user("redis-user")).await.unwrap();
        assert!(listed.iter().any(|j| j.job_id == "redis-test-job"));

        assert!(store.replace(&fetched).await.unwrap());
        assert!(store.delete("redis-test-job").await.unwrap());
        assert!(store.get("redis-test-job").await.unwrap().is_none());
        assert!(!store.replace(&fetched).await.unwrap());
        assert!(store.get("redis-test-job").await.unwrap().is_none());
    }
}
