//! Fingerprint-keyed TTL caches for extracted features and search outcomes.

pub mod config;
pub mod layer;


pub use config::{CacheConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_LOOKUP_TIMEOUT};
pub use layer::{CacheLayer, CacheStats};
