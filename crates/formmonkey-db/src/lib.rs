//! # formmonkey-db
//!
//! Storage layer for the FormMonkey document pipeline.
//!
//! This crate provides:
//! - Redis job backend with native TTL expiry
//! - In-memory job backend with explicit sweep
//! - A hybrid job store that falls back to memory when its durable backend degrades
//! - In-memory profile storage
//!
//! ## Example
//!
//! ```rust,ignore
//! use formmonkey_db::{Database, Job, JobStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> formmonkey_db::Result<()> {
//!     let db = Database::connect(&StoreConfig::from_env()).await;
//!     let job = db.jobs.put(Job::new("job-1", "user-1", "/uploads/lease.pdf")).await?;
//!     println!("Stored job {} ({})", job.job_id, job.status);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod jobs;
pub mod memory;
pub mod profiles;
pub mod redis_store;

use std::sync::Arc;

// Re-export core types
pub use formmonkey_core::*;

pub use backend::{DurableJobBackend, ScanError};
pub use config::StoreConfig;
pub use jobs::HybridJobStore;
pub use memory::MemoryJobStore;
pub use profiles::MemoryProfileStore;
pub use redis_store::RedisJobStore;

/// Combined storage context, constructed once and injected into components.
#[derive(Clone)]
pub struct Database {
    /// Job records.
    pub jobs: Arc<HybridJobStore>,
    /// User profiles.
    pub profiles: Arc<MemoryProfileStore>,
}

impl Database {
    /// Build the storage context from configuration.
    pub async fn connect(config: &StoreConfig) -> Self {
        Self {
            jobs: Arc::new(HybridJobStore::connect(config).await),
            profiles: Arc::new(MemoryProfileStore::new()),
        }
    }

    /// Memory-only storage context.
    pub fn in_memory() -> Self {
        Self {
            jobs: Arc::new(HybridJobStore::in_memory(StoreConfig::default().retention())),
            profiles: Arc::new(MemoryProfileStore::new()),
        }
    }

    /// Tear down backend connections.
    pub async fn close(&self) {
        self.jobs.close().await;
    }
}
