use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, check_unit_interval};

pub const DEFAULT_SIMILARITY_WEIGHT: f32 = 1.0;
pub const DEFAULT_BRAND_BONUS: f32 = 0.2;
pub const DEFAULT_CATEGORY_BONUS: f32 = 0.1;
pub const DEFAULT_QUALITY_PENALTY: f32 = 0.1;
pub const DEFAULT_QUALITY_FLOOR: f32 = 0.5;

/// Static rerank weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub similarity_weight: f32,
    pub brand_bonus: f32,
    pub category_bonus: f32,
    /// Multiplier on `max(0, quality_floor - image_quality_score)`.
    pub quality_penalty: f32,
    pub quality_floor: f32,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            similarity_weight: DEFAULT_SIMILARITY_WEIGHT,
            brand_bonus: DEFAULT_BRAND_BONUS,
            category_bonus: DEFAULT_CATEGORY_BONUS,
            quality_penalty: DEFAULT_QUALITY_PENALTY,
            quality_floor: DEFAULT_QUALITY_FLOOR,
        }
    }
}

impl RerankerConfig {
    pub fn with_brand_bonus(mut self, bonus: f32) -> Self {
        self.brand_bonus = bonus;
        self
    }

    pub fn with_category_bonus(mut self, bonus: f32) -> Self {
        self.category_bonus = bonus;
        self
    }

    pub fn with_quality_penalty(mut self, penalty: f32, floor: f32) -> Self {
        self.quality_penalty = penalty;
        self.quality_floor = floor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("similarity_weight", self.similarity_weight),
            ("brand_bonus", self.brand_bonus),
            ("category_bonus", self.category_bonus),
            ("quality_penalty", self.quality_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::out_of_range(
                    name,
                    format!("{} must be a non-negative number", value),
                ));
            }
        }
        if self.similarity_weight == 0.0 {
            return Err(ConfigError::out_of_range(
                "similarity_weight",
                "must be positive",
            ));
        }
        check_unit_interval("quality_floor", self.quality_floor)
    }
}
