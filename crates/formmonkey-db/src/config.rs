//! Job store configuration.

use formmonkey_core::defaults;

/// Configuration for the job store backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Whether to try the durable Redis backend.
    pub use_redis: bool,
    /// Redis connection URL.
    pub redis_url: String,
    /// Retention window in hours (Redis TTL and in-memory sweep).
    pub expiration_hours: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            use_redis: false,
            redis_url: defaults::REDIS_URL.to_string(),
            expiration_hours: defaults::JOB_EXPIRATION_HOURS,
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `USE_REDIS` | `false` | Use Redis as the durable job backend |
    /// | `REDIS_URL` | `redis://localhost:6379/0` | Redis connection URL |
    /// | `JOB_EXPIRATION_HOURS` | `24` | Job retention window |
    pub fn from_env() -> Self {
        let use_redis = std::env::var("USE_REDIS")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| defaults::REDIS_URL.to_string());

        let expiration_hours = std::env::var("JOB_EXPIRATION_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(defaults::JOB_EXPIRATION_HOURS);

        Self {
            use_redis,
            redis_url,
            expiration_hours,
        }
    }

    /// Enable the Redis backend at the given URL.
    pub fn with_redis(mut self, url: impl Into<String>) -> Self {
        self.use_redis = true;
        self.redis_url = url.into();
        self
    }

    /// Set the retention window in hours.
    pub fn with_expiration_hours(mut self, hours: i64) -> Self {
        self.expiration_hours = hours.max(1);
        self
    }

    /// Retention window as a duration.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expiration_hours)
    }

    /// Redis TTL in seconds.
    pub fn ttl_seconds(&self) -> u64 {
        (self.expiration_hours.max(1) as u64) * 3600
    }
}
