//! Half-life recency decay

use crate::error::{Error, Result};
use crate::signals::ebbinghaus::UNKNOWN_AGE_SCORE;
use crate::store::types::{days_since, round6, PatternRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// `0.5^(days / half_life)`, with negative ages clamped to 0
pub fn decay_factor(days: f64, half_life_days: f64) -> Result<f64> {
    if !(half_life_days > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "half_life_days must be positive, got {}",
            half_life_days
        )));
    }
    Ok(0.5f64.powf(days.max(0.0) / half_life_days))
}

/// Decay score per pattern from its last-seen date
pub fn time_decay_scores(
    patterns: &BTreeMap<String, PatternRecord>,
    half_life_days: f64,
    now: DateTime<Utc>,
) -> Result<BTreeMap<String, f64>> {
    let mut scores = BTreeMap::new();
    for (text, record) in patterns {
        let score = match record
            .last_seen
            .as_deref()
            .and_then(|value| days_since(value, now))
        {
            Some(days) => round6(decay_factor(days, half_life_days)?),
            None => UNKNOWN_AGE_SCORE,
        };
        scores.insert(text.clone(), score);
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_half_lives() {
        assert_eq!(decay_factor(0.0, 30.0).unwrap(), 1.0);
        assert!((decay_factor(30.0, 30.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((decay_factor(60.0, 30.0).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(decay_factor(-5.0, 30.0).unwrap(), 1.0);
        assert!(decay_factor(1.0, 0.0).is_err());
    }

    #[test]
    fn test_scores_by_last_seen() {
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        let mut patterns = BTreeMap::new();
        patterns.insert("recent".to_string(), PatternRecord::new(1, "2025-03-02"));
        patterns.insert("month".to_string(), PatternRecord::new(1, "2025-01-31"));
        let mut never = PatternRecord::default();
        never.count = 1;
        patterns.insert("never".to_string(), never);

        let scores = time_decay_scores(&patterns, 30.0, now).unwrap();
        assert_eq!(scores["recent"], 1.0);
        assert_eq!(scores["month"], 0.5);
        assert_eq!(scores["never"], UNKNOWN_AGE_SCORE);
    }
}
