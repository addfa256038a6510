//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `LOOKALIKE_*` environment variables.

pub mod error;


pub use error::ConfigError;
pub(crate) use error::check_unit_interval;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::engine::EngineConfig;
use crate::extraction::PipelineConfig;
use crate::feedback::{ThresholdConfig, TunerConfig};
use crate::index::{DEFAULT_NPROBE, IndexConfig};

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `LOOKALIKE_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Index snapshot file. Default: `./.data/index.rkyv`.
    pub snapshot_path: PathBuf,

    /// Semantic projection weights (safetensors). A deterministic stub is used when unset.
    pub model_path: Option<PathBuf>,

    /// Catalog size the index variant is chosen for. Default: `0` (flat).
    pub expected_catalog_size: usize,

    /// Partitions probed per IVF query. Default: `8`.
    pub nprobe: usize,

    /// Max entries per cache (features, search results). Default: `10_000`.
    pub cache_capacity: u64,

    /// Cache entry lifetime in seconds. Default: `86_400`.
    pub cache_ttl_secs: u64,

    /// Initial similarity threshold. Default: `0.7`.
    pub similarity_threshold: f32,

    /// Feedback records that wake the tuner early. Default: `100`.
    pub tuner_batch_size: usize,

    /// Tuner wake-up interval in seconds. Default: `60`.
    pub tuner_interval_secs: u64,

    /// Feedback records buffered before the oldest are evicted. Default: `10_000`.
    pub feedback_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            snapshot_path: PathBuf::from("./.data/index.rkyv"),
            model_path: None,
            expected_catalog_size: 0,
            nprobe: DEFAULT_NPROBE,
            cache_capacity: 10_000,
            cache_ttl_secs: 86_400,
            similarity_threshold: crate::constants::DEFAULT_MIN_SIMILARITY,
            tuner_batch_size: 100,
            tuner_interval_secs: 60,
            feedback_capacity: 10_000,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "LOOKALIKE_PORT";
    const ENV_BIND_ADDR: &'static str = "LOOKALIKE_BIND_ADDR";
    const ENV_SNAPSHOT_PATH: &'static str = "LOOKALIKE_SNAPSHOT_PATH";
    const ENV_MODEL_PATH: &'static str = "LOOKALIKE_MODEL_PATH";
    const ENV_EXPECTED_CATALOG_SIZE: &'static str = "LOOKALIKE_EXPECTED_CATALOG_SIZE";
    const ENV_NPROBE: &'static str = "LOOKALIKE_NPROBE";
    const ENV_CACHE_CAPACITY: &'static str = "LOOKALIKE_CACHE_CAPACITY";
    const ENV_CACHE_TTL_SECS: &'static str = "LOOKALIKE_CACHE_TTL_SECS";
    const ENV_SIMILARITY_THRESHOLD: &'static str = "LOOKALIKE_SIMILARITY_THRESHOLD";
    const ENV_TUNER_BATCH_SIZE: &'static str = "LOOKALIKE_TUNER_BATCH_SIZE";
    const ENV_TUNER_INTERVAL_SECS: &'static str = "LOOKALIKE_TUNER_INTERVAL_SECS";
    const ENV_FEEDBACK_CAPACITY: &'static str = "LOOKALIKE_FEEDBACK_CAPACITY";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let snapshot_path =
            Self::parse_path_from_env(Self::ENV_SNAPSHOT_PATH, defaults.snapshot_path);
        let model_path = Self::parse_optional_path_from_env(Self::ENV_MODEL_PATH);
        let expected_catalog_size = Self::parse_number_from_env(
            Self::ENV_EXPECTED_CATALOG_SIZE,
            defaults.expected_catalog_size,
        )?;
        let nprobe = Self::parse_number_from_env(Self::ENV_NPROBE, defaults.nprobe)?;
        let cache_capacity =
            Self::parse_number_from_env(Self::ENV_CACHE_CAPACITY, defaults.cache_capacity)?;
        let cache_ttl_secs =
            Self::parse_number_from_env(Self::ENV_CACHE_TTL_SECS, defaults.cache_ttl_secs)?;
        let similarity_threshold = Self::parse_number_from_env(
            Self::ENV_SIMILARITY_THRESHOLD,
            defaults.similarity_threshold,
        )?;
        let tuner_batch_size =
            Self::parse_number_from_env(Self::ENV_TUNER_BATCH_SIZE, defaults.tuner_batch_size)?;
        let tuner_interval_secs = Self::parse_number_from_env(
            Self::ENV_TUNER_INTERVAL_SECS,
            defaults.tuner_interval_secs,
        )?;
        let feedback_capacity =
            Self::parse_number_from_env(Self::ENV_FEEDBACK_CAPACITY, defaults.feedback_capacity)?;

        Ok(Self {
            port,
            bind_addr,
            snapshot_path,
            model_path,
            expected_catalog_size,
            nprobe,
            cache_capacity,
            cache_ttl_secs,
            similarity_threshold,
            tuner_batch_size,
            tuner_interval_secs,
            feedback_capacity,
        })
    }

    /// Validates paths and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_path.exists() && !self.snapshot_path.is_file() {
            return Err(ConfigError::NotAFile {
                path: self.snapshot_path.clone(),
            });
        }

        if let Some(ref path) = self.model_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        check_unit_interval("similarity_threshold", self.similarity_threshold)?;

        if self.nprobe == 0 {
            return Err(ConfigError::out_of_range("nprobe", "must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::out_of_range(
                "cache_capacity",
                "must be at least 1",
            ));
        }
        if self.tuner_batch_size == 0 {
            return Err(ConfigError::out_of_range(
                "tuner_batch_size",
                "must be at least 1",
            ));
        }
        if self.tuner_interval_secs == 0 {
            return Err(ConfigError::out_of_range(
                "tuner_interval_secs",
                "must be at least 1",
            ));
        }
        if self.feedback_capacity == 0 {
            return Err(ConfigError::out_of_range(
                "feedback_capacity",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Builds the engine configuration these settings describe.
    pub fn engine_config(&self) -> EngineConfig {
        let cache = CacheConfig::default()
            .capacity(self.cache_capacity)
            .ttl(Duration::from_secs(self.cache_ttl_secs));

        EngineConfig::default()
            .index(IndexConfig::for_catalog_size(
                self.expected_catalog_size,
                self.nprobe,
            ))
            .pipeline(PipelineConfig::default().model_path(self.model_path.clone()))
            .feature_cache(cache.clone())
            .search_cache(cache)
            .thresholds(ThresholdConfig::default().with_similarity(self.similarity_threshold))
            .tuner(
                TunerConfig::default()
                    .batch_size(self.tuner_batch_size)
                    .interval(Duration::from_secs(self.tuner_interval_secs)),
            )
            .feedback_capacity(self.feedback_capacity)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_number_from_env<T: FromStr>(
        var_name: &'static str,
        default: T,
    ) -> Result<T, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: var_name,
                    value,
                }),
            Err(_) => Ok(default),
        }
    }
}
