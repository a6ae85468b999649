//! Rating scale and aggregation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Arithmetic mean of `scores`, `0.0` when there are none.
pub fn mean_rating(scores: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = scores
        .into_iter()
        .fold((0.0_f64, 0_usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Inclusive range of scores a user may give.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: f64,
    pub max: f64,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

impl RatingScale {
    pub fn check(&self, score: f64) -> Result<f64, CoreError> {
        if score.is_finite() && score >= self.min && score <= self.max {
            Ok(score)
        } else {
            Err(CoreError::rating_out_of_range(score, self.min, self.max))
        }
    }
}
