use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-selected search mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    #[default]
    Standard,
    /// Standard search repeated on perturbed queries; keeps only consistent matches.
    StabilityCheck,
    /// Diagnostic ladder of thresholds returning the whole distribution.
    MultiThreshold,
    /// Starts at the lowered fallback floor with a widened `top_k`.
    Aggressive,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 4] = [
        SearchStrategy::Standard,
        SearchStrategy::StabilityCheck,
        SearchStrategy::MultiThreshold,
        SearchStrategy::Aggressive,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SearchStrategy::Standard => "standard",
            SearchStrategy::StabilityCheck => "stability_check",
            SearchStrategy::MultiThreshold => "multi_threshold",
            SearchStrategy::Aggressive => "aggressive",
        }
    }

    pub(crate) fn ordinal(&self) -> u64 {
        match self {
            SearchStrategy::Standard => 0,
            SearchStrategy::StabilityCheck => 1,
            SearchStrategy::MultiThreshold => 2,
            SearchStrategy::Aggressive => 3,
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchState {
    Standard,
    StabilityCheck,
    Aggressive,
    MultiThreshold,
    /// At least one result was produced.
    Done,
    /// Every applicable step came back empty. Not an error.
    Exhausted,
}

/// What a non-terminal step produced after reranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Found,
    Empty,
}

impl StepOutcome {
    pub fn of<T>(results: &[T]) -> Self {
        if results.is_empty() {
            StepOutcome::Empty
        } else {
            StepOutcome::Found
        }
    }
}

/// Every legal `(state, outcome) -> next` edge. Terminal states have no edges.
pub const TRANSITIONS: [(SearchState, StepOutcome, SearchState); 8] = [
    (SearchState::Standard, StepOutcome::Found, SearchState::Done),
    (SearchState::Standard, StepOutcome::Empty, SearchState::Aggressive),
    (SearchState::StabilityCheck, StepOutcome::Found, SearchState::Done),
    (SearchState::StabilityCheck, StepOutcome::Empty, SearchState::Aggressive),
    (SearchState::Aggressive, StepOutcome::Found, SearchState::Done),
    (SearchState::Aggressive, StepOutcome::Empty, SearchState::Exhausted),
    (SearchState::MultiThreshold, StepOutcome::Found, SearchState::Done),
    (SearchState::MultiThreshold, StepOutcome::Empty, SearchState::Exhausted),
];

impl SearchState {
    pub fn initial(strategy: SearchStrategy) -> Self {
        match strategy {
            SearchStrategy::Standard => SearchState::Standard,
            SearchStrategy::StabilityCheck => SearchState::StabilityCheck,
            SearchStrategy::MultiThreshold => SearchState::MultiThreshold,
            SearchStrategy::Aggressive => SearchState::Aggressive,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchState::Done | SearchState::Exhausted)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SearchState::Standard => "STANDARD",
            SearchState::StabilityCheck => "STABILITY_CHECK",
            SearchState::Aggressive => "AGGRESSIVE",
            SearchState::MultiThreshold => "MULTI_THRESHOLD",
            SearchState::Done => "DONE",
            SearchState::Exhausted => "EXHAUSTED",
        }
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Looks up the next state; terminal states stay where they are.
pub fn transition(state: SearchState, outcome: StepOutcome) -> SearchState {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == state && *on == outcome)
        .map_or(state, |(_, _, to)| *to)
}
