use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::index::{FeatureVector, IndexGeneration, IndexHit, VectorIndex};
use crate::metadata::MetadataStore;
use crate::orchestrator::CandidateSource;

use super::error::{SearchError, Stage};

/// Candidates from one pinned index generation, with metadata refreshed from the store.
///
/// Each attempt runs on the blocking pool under `timeout`; timed-out attempts are retried
/// with linear backoff and surface as [`SearchError::InfrastructureTimeout`] once
/// `attempts` is exhausted.
pub(crate) struct IndexSource<'a, M> {
    pub generation: Arc<IndexGeneration>,
    pub overfetch_factor: usize,
    pub metadata: &'a M,
    pub timeout: Duration,
    pub attempts: u32,
    pub backoff: Duration,
    pub searches: &'a AtomicU64,
}

impl<M: MetadataStore> IndexSource<'_, M> {
    fn refresh(&self, hits: Vec<IndexHit>) -> Vec<IndexHit> {
        hits.into_iter()
            .map(|mut hit| {
                if let Some(current) = self.metadata.get(&hit.item_id) {
                    hit.metadata = Arc::new(current);
                }
                hit
            })
            .collect()
    }
}

impl<M: MetadataStore> CandidateSource for IndexSource<'_, M> {
    fn candidates(
        &self,
        query: &FeatureVector,
        top_k: usize,
    ) -> impl Future<Output = Result<Vec<IndexHit>, SearchError>> + Send {
        let limit = top_k.saturating_mul(self.overfetch_factor);
        async move {
            let mut attempt = 0;
            loop {
                attempt += 1;
                self.searches.fetch_add(1, Ordering::Relaxed);

                let generation = Arc::clone(&self.generation);
                let q = query.clone();
                let task = tokio::task::spawn_blocking(move || {
                    VectorIndex::search_generation(&generation, &q, limit)
                });

                match tokio::time::timeout(self.timeout, task).await {
                    Ok(Ok(Ok(hits))) => {
                        debug!(candidates = hits.len(), limit, attempt, "Index search finished");
                        return Ok(self.refresh(hits));
                    }
                    Ok(Ok(Err(e))) => {
                        let err = SearchError::from(e);
                        if let SearchError::DimensionMismatch { expected, actual } = err {
                            error!(expected, actual, "Query vector does not fit the index");
                        }
                        return Err(err);
                    }
                    Ok(Err(join)) => return Err(SearchError::internal(Stage::Index, join)),
                    Err(_) if attempt < self.attempts => {
                        warn!(
                            attempt,
                            timeout_ms = self.timeout.as_millis() as u64,
                            "Index search timed out, retrying"
                        );
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                    Err(_) => {
                        warn!(attempts = attempt, "Index search timed out");
                        return Err(SearchError::InfrastructureTimeout {
                            stage: Stage::Index,
                            attempts: attempt,
                        });
                    }
                }
            }
        }
    }
}
