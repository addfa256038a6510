use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::ConfigError;

use super::config::CacheConfig;

/// Point-in-time counters for one [`CacheLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub lookups: u64,
    /// Lookups answered without running the compute function (stored or in-flight).
    pub hits: u64,
    pub computations: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub entries: u64,
    pub hit_ratio: f64,
}

#[derive(Debug, Default)]
struct Counters {
    lookups: AtomicU64,
    computations: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
}

/// TTL cache keyed by 32-byte fingerprints with single-flight computation.
///
/// Concurrent `get_or_compute` calls for the same key share one computation. A failed
/// computation is not cached; every waiter observes the same error and a later call
/// retries.
pub struct CacheLayer<V> {
    name: &'static str,
    entries: Cache<[u8; 32], V>,
    config: CacheConfig,
    counters: Arc<Counters>,
}

impl<V> std::fmt::Debug for CacheLayer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("name", &self.name)
            .field("entries", &self.entries.entry_count())
            .field("capacity", &self.config.capacity)
            .field("ttl", &self.config.ttl)
            .finish()
    }
}

impl<V> CacheLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let entries = Cache::builder()
            .name(name)
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();
        Ok(Self {
            name,
            entries,
            config,
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached value for `key`, computing it at most once across concurrent callers.
    #[instrument(skip(self, key, compute), fields(cache = self.name))]
    pub async fn get_or_compute<F, Fut, E>(&self, key: [u8; 32], compute: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        self.lookup_or_compute(key, self.entries.get(&key), compute).await
    }

    /// `lookup` answers from the store within `lookup_timeout` or the value is computed
    /// without touching the cache.
    pub(crate) async fn lookup_or_compute<L, F, Fut, E>(
        &self,
        key: [u8; 32],
        lookup: L,
        compute: F,
    ) -> Result<V, Arc<E>>
    where
        L: Future<Output = Option<V>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        self.counters.lookups.fetch_add(1, Ordering::Relaxed);

        match tokio::time::timeout(self.config.lookup_timeout, lookup).await {
            Ok(Some(value)) => {
                debug!("Cache hit");
                return Ok(value);
            }
            Ok(None) => {}
            Err(_) => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    timeout_ms = self.config.lookup_timeout.as_millis() as u64,
                    "Cache lookup timed out, computing directly"
                );
                return self.compute_uncached(compute).await;
            }
        }

        let computed = AtomicBool::new(false);
        let counters = &self.counters;
        let result = self
            .entries
            .try_get_with(key, async {
                computed.store(true, Ordering::Relaxed);
                counters.computations.fetch_add(1, Ordering::Relaxed);
                compute().await
            })
            .await;

        if result.is_err() && computed.load(Ordering::Relaxed) {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            computed = computed.load(Ordering::Relaxed),
            ok = result.is_ok(),
            "Cache lookup resolved"
        );
        result
    }

    async fn compute_uncached<F, Fut, E>(&self, compute: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.counters.computations.fetch_add(1, Ordering::Relaxed);
        compute().await.map_err(|e| {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            Arc::new(e)
        })
    }

    pub async fn get(&self, key: &[u8; 32]) -> Option<V> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: [u8; 32], value: V) {
        self.entries.insert(key, value).await;
    }

    pub fn contains(&self, key: &[u8; 32]) -> bool {
        self.entries.contains_key(key)
    }

    /// Drops every entry; in-flight computations still complete for their waiters.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
        debug!(cache = self.name, "Cache invalidated");
    }

    /// Approximate entry count (pending maintenance may lag).
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs pending maintenance so counts and expirations are current.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    pub fn stats(&self) -> CacheStats {
        let lookups = self.counters.lookups.load(Ordering::Relaxed);
        let computations = self.counters.computations.load(Ordering::Relaxed);
        let hits = lookups.saturating_sub(computations);
        CacheStats {
            lookups,
            hits,
            computations,
            failures: self.counters.failures.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            entries: self.entries.entry_count(),
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}
