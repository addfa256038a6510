//! The [`SearchEngine`] context: owns the index, caches, thresholds and feedback loop.
//!
//! Request flow for [`SearchEngine::search`]:
//!
//! ```text
//! bytes -> feature cache (fingerprint) -> extractor
//!       -> search cache (vector, params, thresholds, index generation)
//!       -> orchestrator -> pinned index generation -> reranker
//! ```

pub mod config;
pub mod error;
mod source;
pub mod types;


pub use config::{
    DEFAULT_EXTRACTION_TIMEOUT, DEFAULT_FEEDBACK_CAPACITY, DEFAULT_INDEX_ATTEMPTS,
    DEFAULT_INDEX_TIMEOUT, DEFAULT_RETRY_BACKOFF, EngineConfig,
};
pub use error::{EngineError, EngineResult, SearchError, Stage};
pub use types::{
    BatchReport, EngineStats, IndexStats, ItemFailure, MAX_TOP_K, SearchRequest, SearchResponse,
};

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::CacheLayer;
use crate::constants::validate_embedding_dim;
use crate::extraction::{FeatureExtractor, FeaturePipeline};
use crate::feedback::{
    FeedbackBuffer, FeedbackLoop, FeedbackRecord, QueryLog, SearchStatistics, SignalType,
    ThresholdConfig, ThresholdStore, ThresholdTuner, TracingSink, TunerHandle, TuningReport,
    spawn_tuner,
};
use crate::hashing::{KeyHasher, fingerprint_image};
use crate::index::{FeatureVector, IndexEntry, IndexGeneration, VectorIndex, WriteMode};
use crate::metadata::{InMemoryMetadataStore, MetadataStore};
use crate::orchestrator::{SearchOrchestrator, SearchOutcome, SearchPlan};
use crate::scoring::Reranker;
use crate::storage::SnapshotStore;

use source::IndexSource;

#[derive(Debug, Default)]
struct Counters {
    extractions: AtomicU64,
    index_searches: AtomicU64,
}

pub struct SearchEngine<E = FeaturePipeline, M = InMemoryMetadataStore> {
    config: EngineConfig,
    extractor: Arc<E>,
    metadata: Arc<M>,
    index: Arc<VectorIndex>,
    orchestrator: SearchOrchestrator,
    feature_cache: CacheLayer<FeatureVector>,
    search_cache: CacheLayer<Arc<SearchOutcome>>,
    thresholds: Arc<ThresholdStore>,
    query_log: QueryLog,
    statistics: Arc<SearchStatistics>,
    feedback: FeedbackLoop,
    tuner: Arc<ThresholdTuner>,
    training_samples: Mutex<VecDeque<FeatureVector>>,
    counters: Counters,
}

impl<E, M> std::fmt::Debug for SearchEngine<E, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("index", &self.index)
            .field("thresholds", &self.thresholds.snapshot())
            .field("feature_cache", &self.feature_cache)
            .field("search_cache", &self.search_cache)
            .finish()
    }
}

impl SearchEngine<FeaturePipeline, InMemoryMetadataStore> {
    /// Engine with the configured extraction pipeline, an empty index and an empty
    /// in-memory metadata store.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let pipeline = FeaturePipeline::new(config.pipeline.clone())?;
        Self::with_components(
            config,
            Arc::new(pipeline),
            Arc::new(InMemoryMetadataStore::new()),
        )
    }
}

impl<E, M> SearchEngine<E, M>
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    /// Engine over an empty index sized for `extractor`.
    pub fn with_components(
        config: EngineConfig,
        extractor: Arc<E>,
        metadata: Arc<M>,
    ) -> EngineResult<Self> {
        let index = VectorIndex::new(extractor.output_dim(), config.index)?;
        Self::with_index(config, extractor, metadata, index)
    }

    /// Engine over an index restored from `store`.
    pub fn from_snapshot(
        config: EngineConfig,
        extractor: Arc<E>,
        metadata: Arc<M>,
        store: &SnapshotStore,
    ) -> EngineResult<Self> {
        let snapshot = store.load()?;
        let index = VectorIndex::from_snapshot(snapshot, config.index)?;
        Self::with_index(config, extractor, metadata, index)
    }

    pub fn with_index(
        config: EngineConfig,
        extractor: Arc<E>,
        metadata: Arc<M>,
        index: VectorIndex,
    ) -> EngineResult<Self> {
        config.validate()?;
        if let Err(mismatch) = validate_embedding_dim(extractor.output_dim(), index.dimension()) {
            error!(
                error = %mismatch,
                extractor = extractor.output_dim(),
                index = index.dimension(),
                "Extractor and index dimensions differ"
            );
            return Err(EngineError::DimensionMismatch {
                extractor: extractor.output_dim(),
                index: index.dimension(),
            });
        }

        let reranker = Reranker::new(config.reranker)?;
        let orchestrator = SearchOrchestrator::new(config.orchestrator.clone(), reranker)?;
        let feature_cache = CacheLayer::new("features", config.feature_cache.clone())?;
        let search_cache = CacheLayer::new("searches", config.search_cache.clone())?;
        let thresholds = Arc::new(ThresholdStore::new(config.thresholds)?);
        let query_log = QueryLog::new(config.query_log_capacity, config.query_log_ttl);
        let statistics = Arc::new(SearchStatistics::new());

        let buffer = Arc::new(FeedbackBuffer::new(config.feedback_capacity));
        let tuner = Arc::new(ThresholdTuner::new(
            config.tuner.clone(),
            Arc::clone(&buffer),
            query_log.clone(),
            Arc::clone(&thresholds),
        )?);
        let feedback = FeedbackLoop::new(
            buffer,
            Arc::new(TracingSink),
            Arc::clone(&statistics),
            &config.tuner,
        );

        info!(
            dimension = index.dimension(),
            items = index.len(),
            variant = index.config().variant.name(),
            similarity = config.thresholds.similarity,
            "Search engine initialized"
        );

        Ok(Self {
            config,
            extractor,
            metadata,
            index: Arc::new(index),
            orchestrator,
            feature_cache,
            search_cache,
            thresholds,
            query_log,
            statistics,
            feedback,
            tuner,
            training_samples: Mutex::new(VecDeque::new()),
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn metadata_store(&self) -> &Arc<M> {
        &self.metadata
    }

    /// Published thresholds.
    pub fn thresholds(&self) -> ThresholdConfig {
        self.thresholds.snapshot()
    }

    /// Feature extractions actually run (cache misses).
    pub fn extraction_count(&self) -> u64 {
        self.counters.extractions.load(Ordering::Relaxed)
    }

    /// Index search attempts actually run.
    pub fn index_search_count(&self) -> u64 {
        self.counters.index_searches.load(Ordering::Relaxed)
    }

    /// Features for `bytes`, extracted at most once per distinct content.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn extract(&self, bytes: &[u8]) -> Result<FeatureVector, SearchError> {
        let key = fingerprint_image(bytes);
        self.feature_cache
            .get_or_compute(key, move || self.extract_uncached(bytes.to_vec()))
            .await
            .map_err(|e| (*e).clone())
    }

    async fn extract_uncached(&self, bytes: Vec<u8>) -> Result<FeatureVector, SearchError> {
        self.counters.extractions.fetch_add(1, Ordering::Relaxed);
        let extractor = Arc::clone(&self.extractor);
        let task = tokio::task::spawn_blocking(move || extractor.extract(&bytes));

        match tokio::time::timeout(self.config.extraction_timeout, task).await {
            Ok(Ok(result)) => result.map_err(SearchError::from),
            Ok(Err(join)) => Err(SearchError::internal(Stage::Extraction, join)),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.extraction_timeout.as_millis() as u64,
                    "Feature extraction timed out"
                );
                Err(SearchError::InfrastructureTimeout {
                    stage: Stage::Extraction,
                    attempts: 1,
                })
            }
        }
    }

    /// Ranked matches for an image. An empty result set is not an error.
    #[instrument(
        skip(self, bytes, request),
        fields(top_k = request.top_k, strategy = %request.strategy)
    )]
    pub async fn search(
        &self,
        bytes: &[u8],
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        request.validate()?;
        let query = self.extract(bytes).await?;
        self.search_vector(&query, request).await
    }

    /// Ranked matches for an already extracted query vector.
    pub async fn search_vector(
        &self,
        query: &FeatureVector,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        request.validate()?;
        let thresholds = request.effective_thresholds(self.thresholds.snapshot());
        let generation = self.index.pin();
        let key = self.search_key(query, request, &thresholds, &generation);

        let computed_flag = AtomicBool::new(false);
        let computed = &computed_flag;
        let generation = &generation;
        let thresholds = &thresholds;
        let outcome = self
            .search_cache
            .get_or_compute(key, move || async move {
                computed.store(true, Ordering::Relaxed);
                let source = IndexSource {
                    generation: Arc::clone(generation),
                    overfetch_factor: self.index.config().overfetch_factor,
                    metadata: self.metadata.as_ref(),
                    timeout: self.config.index_timeout,
                    attempts: self.config.index_attempts,
                    backoff: self.config.retry_backoff,
                    searches: &self.counters.index_searches,
                };
                let plan = SearchPlan {
                    query,
                    top_k: request.top_k,
                    strategy: request.strategy,
                    thresholds,
                    query_metadata: request.query_metadata_ref(),
                    department: request.department_ref(),
                };
                self.orchestrator.run(&source, &plan).await.map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())?;

        let query_id = Uuid::new_v4();
        self.query_log.record(query_id, &outcome.candidates);
        self.statistics.record_search(request.strategy, &outcome);

        let cached = !computed_flag.load(Ordering::Relaxed);
        info!(
            query_id = %query_id,
            results = outcome.results.len(),
            state = %outcome.state,
            best_score = outcome.results.first().map(|r| r.final_score),
            cached,
            "Search completed"
        );

        Ok(SearchResponse {
            query_id,
            results: outcome.results.clone(),
            strategy: request.strategy,
            state: outcome.state,
            fallback: outcome.used_fallback(),
            cached,
            thresholds: *thresholds,
            distribution: outcome.distribution.clone(),
        })
    }

    fn search_key(
        &self,
        query: &FeatureVector,
        request: &SearchRequest,
        thresholds: &ThresholdConfig,
        generation: &IndexGeneration,
    ) -> [u8; 32] {
        let metadata = request.query_metadata_ref();
        KeyHasher::new(b"search")
            .vector(query.as_slice())
            .u64(request.top_k as u64)
            .u64(request.strategy.ordinal())
            .f32(thresholds.similarity)
            .f32(thresholds.confidence)
            .f32(thresholds.relevance)
            .u64(thresholds.generation)
            .u64(generation.id())
            .opt_str(metadata.and_then(|m| m.brand.as_deref()))
            .opt_str(metadata.and_then(|m| m.category.as_deref()))
            .opt_str(request.department_ref())
            .finish()
    }

    /// Extracts `bytes` and indexes them under `item_id` with metadata from the store.
    #[instrument(skip(self, item_id, bytes), fields(item_id = %item_id, bytes = bytes.len()))]
    pub async fn ingest_item(
        &self,
        item_id: &str,
        bytes: &[u8],
        mode: WriteMode,
    ) -> Result<(), SearchError> {
        check_item_id(item_id)?;
        if mode == WriteMode::Insert && self.index.contains(item_id) {
            return Err(SearchError::DuplicateItemId {
                item_id: item_id.to_string(),
            });
        }
        let vector = self.extract(bytes).await?;
        self.ingest_vector(item_id, vector, mode).await
    }

    /// Indexes a precomputed vector under `item_id`.
    pub async fn ingest_vector(
        &self,
        item_id: &str,
        vector: FeatureVector,
        mode: WriteMode,
    ) -> Result<(), SearchError> {
        check_item_id(item_id)?;
        let metadata = self.metadata.get(item_id).unwrap_or_default();
        let entry = IndexEntry::new(item_id, vector, metadata);
        self.write(vec![entry], mode).await?;
        info!(item_id, items = self.index.len(), "Item ingested");
        Ok(())
    }

    /// Extracts every item concurrently, then indexes the successful ones in one write.
    ///
    /// Extraction failures are reported per item; a failed index write fails the batch.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn ingest_batch(
        &self,
        items: Vec<(String, Vec<u8>)>,
        mode: WriteMode,
    ) -> Result<BatchReport, SearchError> {
        let extracted = join_all(items.iter().map(move |(item_id, bytes)| async move {
            let result = match check_item_id(item_id) {
                Ok(()) => self.extract(bytes).await,
                Err(e) => Err(e),
            };
            (item_id.clone(), result)
        }))
        .await;

        let mut report = BatchReport::default();
        let mut entries = Vec::with_capacity(extracted.len());
        for (item_id, result) in extracted {
            match result {
                Ok(vector) => {
                    let metadata = self.metadata.get(&item_id).unwrap_or_default();
                    entries.push(IndexEntry::new(item_id, vector, metadata));
                }
                Err(error) => {
                    debug!(item_id = %item_id, error = %error, "Batch item failed extraction");
                    report.failures.push(ItemFailure { item_id, error });
                }
            }
        }

        report.ingested = self.write(entries, mode).await?;
        info!(
            ingested = report.ingested,
            failed = report.failures.len(),
            items = self.index.len(),
            "Batch ingested"
        );
        Ok(report)
    }

    async fn write(&self, entries: Vec<IndexEntry>, mode: WriteMode) -> Result<usize, SearchError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || index.write(entries, mode))
            .await
            .map_err(|e| SearchError::internal(Stage::Ingest, e))?
            .map_err(SearchError::from)
    }

    /// Fits the index partitions (and codebooks) on `samples`.
    #[instrument(skip(self, samples), fields(samples = samples.len()))]
    pub async fn train_index(&self, samples: Vec<FeatureVector>) -> Result<(), SearchError> {
        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || index.train(&samples))
            .await
            .map_err(|e| SearchError::internal(Stage::Index, e))?
            .map_err(SearchError::from)?;
        self.search_cache.invalidate_all();
        Ok(())
    }

    /// Extracts `bytes` into the training buffer and returns the buffered count.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn add_training_sample(&self, bytes: &[u8]) -> Result<usize, SearchError> {
        let vector = self.extract(bytes).await?;
        let mut samples = self.training_samples.lock();
        if samples.len() >= self.config.training_buffer_capacity {
            samples.pop_front();
        }
        samples.push_back(vector);
        Ok(samples.len())
    }

    pub fn buffered_training_samples(&self) -> usize {
        self.training_samples.lock().len()
    }

    /// Trains on the buffered samples followed by `extra`.
    ///
    /// The samples that were used leave the buffer only when training succeeds.
    #[instrument(skip(self, extra), fields(extra = extra.len()))]
    pub async fn train_buffered(&self, extra: Vec<FeatureVector>) -> Result<usize, SearchError> {
        let mut samples: Vec<FeatureVector> =
            self.training_samples.lock().iter().cloned().collect();
        let buffered = samples.len();
        samples.extend(extra);
        if samples.is_empty() {
            return Err(SearchError::invalid("no training samples supplied or buffered"));
        }

        let total = samples.len();
        self.train_index(samples).await?;

        let mut remaining = self.training_samples.lock();
        let used = buffered.min(remaining.len());
        remaining.drain(..used);
        info!(samples = total, buffered = used, "Index trained from samples");
        Ok(total)
    }

    /// Records feedback on a result. Never blocks on tuning.
    pub fn submit_feedback(
        &self,
        query_id: Uuid,
        item_id: &str,
        signal: SignalType,
        value: f32,
    ) -> Result<(), SearchError> {
        check_item_id(item_id)?;
        if !value.is_finite() {
            return Err(SearchError::invalid("feedback value must be finite"));
        }
        self.feedback
            .submit(FeedbackRecord::new(query_id, item_id, signal, value));
        Ok(())
    }

    /// Runs one tuning pass immediately.
    pub fn run_tuner_once(&self) -> TuningReport {
        self.tuner.run_once()
    }

    /// Starts the background tuner. Call once per engine.
    pub fn spawn_tuner(&self) -> TunerHandle {
        spawn_tuner(Arc::clone(&self.tuner), self.feedback.wake_handle())
    }

    pub fn invalidate_caches(&self) {
        self.feature_cache.invalidate_all();
        self.search_cache.invalidate_all();
        info!("Caches invalidated");
    }

    pub fn stats(&self) -> EngineStats {
        let generation = self.index.pin();
        EngineStats {
            searches: self.statistics.snapshot(),
            index: IndexStats {
                variant: generation.variant().name(),
                dimension: generation.dimension(),
                items: generation.len(),
                generation: generation.id(),
                trained: generation.is_trained(),
            },
            feature_cache: self.feature_cache.stats(),
            search_cache: self.search_cache.stats(),
            thresholds: self.thresholds.snapshot(),
            feedback_buffered: self.feedback.buffer().len(),
            extractions: self.extraction_count(),
            index_searches: self.index_search_count(),
        }
    }

    /// Writes the current index generation to `store`; returns bytes written.
    pub fn save_snapshot(&self, store: &SnapshotStore) -> EngineResult<usize> {
        Ok(store.save(&self.index.snapshot())?)
    }
}

fn check_item_id(item_id: &str) -> Result<(), SearchError> {
    if item_id.trim().is_empty() {
        return Err(SearchError::invalid("item_id must not be empty"));
    }
    Ok(())
}
