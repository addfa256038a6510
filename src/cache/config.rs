use std::time::Duration;

use crate::config::ConfigError;

pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Search results stay valid for a day unless thresholds or the index change first.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86_400);

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Max live entries (LRU-ish eviction beyond this).
    pub capacity: u64,
    /// Entry lifetime; an expired entry is a miss.
    pub ttl: Duration,
    /// Budget for the lookup itself; exceeding it is treated as a miss.
    pub lookup_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: DEFAULT_CACHE_TTL,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

impl CacheConfig {
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::out_of_range("cache capacity", "must be at least 1"));
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::out_of_range("cache ttl", "must be non-zero"));
        }
        if self.lookup_timeout.is_zero() {
            return Err(ConfigError::out_of_range(
                "cache lookup_timeout",
                "must be non-zero",
            ));
        }
        Ok(())
    }
}
