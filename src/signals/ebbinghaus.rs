//! Ebbinghaus forgetting curve
//!
//! Retention `R(t) = e^(-t / s)` where the strength `s` grows linearly with
//! the number of repetitions: `s = base + growth * (repetitions - 1)`.

use crate::error::{Error, Result};
use crate::store::types::{days_since, round6, PatternRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Score assigned when the last-seen date is missing or unparsable
pub const UNKNOWN_AGE_SCORE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EbbinghausParams {
    pub base_strength: f64,
    pub growth_factor: f64,
}

impl Default for EbbinghausParams {
    fn default() -> Self {
        Self {
            base_strength: 1.0,
            growth_factor: 0.5,
        }
    }
}

/// Memory strength after `repetitions` observations (at least 1)
pub fn memory_strength(repetitions: u64, params: EbbinghausParams) -> Result<f64> {
    if repetitions < 1 {
        return Err(Error::InvalidParameter(
            "repetitions must be at least 1".to_string(),
        ));
    }
    Ok(params.base_strength + params.growth_factor * (repetitions - 1) as f64)
}

/// Retention after `days` for strength `strength`
pub fn retention(days: f64, strength: f64) -> Result<f64> {
    if !(strength > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "strength must be positive, got {}",
            strength
        )));
    }
    Ok((-days.max(0.0) / strength).exp())
}

/// Retention score per pattern.
///
/// Repetitions are the pattern's count (at least 1). Age is the fractional
/// number of days since `last_seen`; a record without a usable date gets
/// [`UNKNOWN_AGE_SCORE`].
pub fn ebbinghaus_scores(
    patterns: &BTreeMap<String, PatternRecord>,
    params: EbbinghausParams,
    now: DateTime<Utc>,
) -> Result<BTreeMap<String, f64>> {
    let mut scores = BTreeMap::new();
    for (text, record) in patterns {
        let days = record
            .last_seen
            .as_deref()
            .and_then(|value| days_since(value, now));
        let score = match days {
            Some(days) => {
                let strength = memory_strength(record.count.max(1), params)?;
                round6(retention(days, strength)?)
            }
            None => {
                tracing::debug!(pattern = %text, "No usable last_seen, using minimum retention");
                UNKNOWN_AGE_SCORE
            }
        };
        scores.insert(text.clone(), score);
    }
    Ok(scores)
}
