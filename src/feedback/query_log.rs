use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use uuid::Uuid;

use crate::orchestrator::CandidateScore;

pub const DEFAULT_QUERY_LOG_CAPACITY: u64 = 50_000;
pub const DEFAULT_QUERY_LOG_TTL: Duration = Duration::from_secs(3_600);

/// Recent queries and the scores of every candidate they considered.
///
/// Lets feedback on `(query_id, item_id)` be related back to the similarity, final
/// score and stability the item had when it was shown.
#[derive(Clone)]
pub struct QueryLog {
    entries: Cache<Uuid, Arc<HashMap<String, CandidateScore>>>,
}

impl std::fmt::Debug for QueryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryLog")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl QueryLog {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .name("query_log")
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn record(&self, query_id: Uuid, candidates: &[(String, CandidateScore)]) {
        let scores: HashMap<String, CandidateScore> = candidates.iter().cloned().collect();
        self.entries.insert(query_id, Arc::new(scores));
    }

    pub fn score(&self, query_id: &Uuid, item_id: &str) -> Option<CandidateScore> {
        self.entries
            .get(query_id)
            .and_then(|scores| scores.get(item_id).copied())
    }

    pub fn contains(&self, query_id: &Uuid) -> bool {
        self.entries.contains_key(query_id)
    }
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_LOG_CAPACITY, DEFAULT_QUERY_LOG_TTL)
    }
}
