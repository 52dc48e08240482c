//! Promotion candidate selection

use crate::config::PromotionConfig;
use crate::store::types::PatternRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A pattern whose composite score clears the promotion threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionCandidate {
    pub pattern: String,
    pub score: f64,
    pub count: u64,
    /// Bayesian belief mean, when the pattern carries one
    pub confidence: Option<f64>,
    /// Enough observations and, if tracked, enough confidence
    pub ready: bool,
}

/// Unpromoted patterns scoring above `threshold`, highest first (ties by text)
pub fn select_candidates(
    patterns: &BTreeMap<String, PatternRecord>,
    config: &PromotionConfig,
) -> Vec<PromotionCandidate> {
    let mut candidates: Vec<PromotionCandidate> = patterns
        .iter()
        .filter(|(_, r)| !r.promoted && r.composite_score > config.threshold)
        .map(|(text, r)| {
            let confidence = r.bayesian_state.map(|b| b.mean);
            let ready = r.count >= config.min_observations
                && confidence.map_or(true, |c| c >= config.min_confidence);
            PromotionCandidate {
                pattern: text.clone(),
                score: r.composite_score,
                count: r.count,
                confidence,
                ready,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BayesianState;

    fn record(count: u64, score: f64) -> PatternRecord {
        let mut r = PatternRecord::new(count, "2025-01-01");
        r.composite_score = score;
        r
    }

    #[test]
    fn test_threshold_and_order() {
        let mut patterns = BTreeMap::new();
        patterns.insert("low".to_string(), record(10, 0.2));
        patterns.insert("mid".to_string(), record(10, 0.5));
        patterns.insert("high".to_string(), record(10, 0.9));
        patterns.insert("edge".to_string(), record(10, 0.3));
        let mut done = record(10, 0.95);
        done.promoted = true;
        patterns.insert("done".to_string(), done);

        let names: Vec<String> = select_candidates(&patterns, &PromotionConfig::default())
            .into_iter()
            .map(|c| c.pattern)
            .collect();
        assert_eq!(names, vec!["high", "mid"]);
    }

    #[test]
    fn test_ready_flag() {
        let mut patterns = BTreeMap::new();
        patterns.insert("few".to_string(), record(1, 0.8));
        let mut unsure = record(5, 0.8);
        unsure.bayesian_state = Some(BayesianState::new(0.4, 0.01).unwrap());
        patterns.insert("unsure".to_string(), unsure);
        let mut solid = record(5, 0.8);
        solid.bayesian_state = Some(BayesianState::new(0.7, 0.01).unwrap());
        patterns.insert("solid".to_string(), solid);

        let candidates = select_candidates(&patterns, &PromotionConfig::default());
        let ready: BTreeMap<_, _> = candidates
            .iter()
            .map(|c| (c.pattern.as_str(), c.ready))
            .collect();
        assert!(!ready["few"]);
        assert!(!ready["unsure"]);
        assert!(ready["solid"]);
    }
}
