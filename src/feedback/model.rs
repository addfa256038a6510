use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// User rating in `[0, 1]`; `>= 0.5` counts as a good match.
    ExplicitRating,
    /// `1` for a click, `0` for an impression without one.
    Click,
    /// Seconds spent on the result.
    Dwell,
    /// The user refined the query instead of accepting the result.
    Refinement,
}

impl SignalType {
    pub fn is_explicit(&self) -> bool {
        matches!(self, SignalType::ExplicitRating)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalType::ExplicitRating => "explicit_rating",
            SignalType::Click => "click",
            SignalType::Dwell => "dwell",
            SignalType::Refinement => "refinement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub query_id: Uuid,
    pub item_id: String,
    pub signal: SignalType,
    pub value: f32,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(query_id: Uuid, item_id: impl Into<String>, signal: SignalType, value: f32) -> Self {
        Self {
            query_id,
            item_id: item_id.into(),
            signal,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Whether this record endorses or rejects the result.
    pub fn polarity(&self, dwell_cutoff_secs: f32) -> Polarity {
        let positive = match self.signal {
            SignalType::ExplicitRating => self.value >= 0.5,
            SignalType::Click => self.value > 0.0,
            SignalType::Dwell => self.value >= dwell_cutoff_secs,
            SignalType::Refinement => false,
        };
        if positive {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }
}
