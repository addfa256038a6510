//! Lookalike library crate (used by the server and integration tests).
//!
//! # Public API Surface
//!
//! ## Engine
//! - [`SearchEngine`], [`EngineConfig`] - context object owning index, caches and thresholds
//! - [`SearchRequest`], [`SearchResponse`], [`SearchError`] - per-request types
//!
//! ## Building Blocks
//! - [`FeatureExtractor`], [`FeaturePipeline`] - image to vector extraction
//! - [`VectorIndex`], [`IndexConfig`], [`IndexVariant`] - flat / IVF / IVF-PQ search
//! - [`Reranker`], [`RerankerConfig`] - metadata-aware scoring
//! - [`CacheLayer`] - singleflight TTL cache
//! - [`SearchOrchestrator`], [`SearchState`], [`SearchStrategy`] - fallback state machine
//! - [`ThresholdTuner`], [`ThresholdStore`], [`FeedbackLoop`] - adaptive thresholds
//! - [`SnapshotStore`] - rkyv index snapshots
//!
//! ## Server
//! - [`Config`] - `LOOKALIKE_*` environment configuration
//! - [`gateway`] - axum routes
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod extraction;
pub mod feedback;
pub mod gateway;
pub mod hashing;
pub mod index;
pub mod metadata;
pub mod orchestrator;
pub mod scoring;
pub mod storage;

pub use cache::{CacheConfig, CacheLayer, CacheStats};
pub use config::{Config, ConfigError};
pub use constants::{
    DEFAULT_EMBEDDING_DIM, DEFAULT_MIN_SIMILARITY, DEFAULT_TOP_K, DimConfig, DimValidationError,
    validate_embedding_dim,
};
pub use engine::{
    BatchReport, EngineConfig, EngineError, EngineResult, EngineStats, SearchEngine, SearchError,
    SearchRequest, SearchResponse, Stage,
};
#[cfg(any(test, feature = "mock"))]
pub use extraction::MockExtractor;
pub use extraction::{ExtractionError, FeatureExtractor, FeaturePipeline, PipelineConfig};
pub use feedback::{
    FeedbackLoop, FeedbackRecord, SignalType, ThresholdConfig, ThresholdStore, ThresholdTuner,
    TunerConfig,
};
pub use hashing::{KeyHasher, fingerprint_image, hash_to_u64, hash_vector};
pub use index::{
    FeatureVector, IndexConfig, IndexEntry, IndexError, IndexVariant, ItemMetadata, VectorIndex,
    WriteMode,
};
pub use metadata::{InMemoryMetadataStore, MetadataStore};
pub use orchestrator::{SearchOrchestrator, SearchState, SearchStrategy};
pub use scoring::{QueryMetadata, Reranker, RerankerConfig, SearchResult};
pub use storage::{SnapshotStore, StorageError};
