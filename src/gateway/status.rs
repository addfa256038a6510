use crate::engine::SearchResponse;

pub const LOOKALIKE_STATUS_HEADER: &str = "X-Lookalike-Status";
pub const LOOKALIKE_CACHE_HEADER: &str = "X-Lookalike-Cache";
pub const LOOKALIKE_STATUS_HEALTHY: &str = "healthy";
pub const LOOKALIKE_STATUS_READY: &str = "ready";
pub const LOOKALIKE_STATUS_NOT_READY: &str = "not_ready";
pub const LOOKALIKE_STATUS_STORED: &str = "stored";
pub const LOOKALIKE_STATUS_ACCEPTED: &str = "accepted";
pub const LOOKALIKE_STATUS_ERROR: &str = "error";

/// How a search was answered, as reported in [`LOOKALIKE_STATUS_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchStatus {
    Match,
    MatchFallback,
    Empty,
}

impl SearchStatus {
    pub fn of(response: &SearchResponse) -> Self {
        if response.is_empty() {
            SearchStatus::Empty
        } else if response.fallback {
            SearchStatus::MatchFallback
        } else {
            SearchStatus::Match
        }
    }

    #[inline]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            SearchStatus::Match => "MATCH",
            SearchStatus::MatchFallback => "MATCH_FALLBACK",
            SearchStatus::Empty => "EMPTY",
        }
    }
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_header_value())
    }
}

#[inline]
pub fn cache_header_value(cached: bool) -> &'static str {
    if cached { "HIT" } else { "MISS" }
}
