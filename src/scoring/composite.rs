//! Weighted composite score
//!
//! Every weighted signal that produced scores in this pass is min-max
//! normalized across all patterns, multiplied by its weight and summed.
//! Signals that produced nothing are left out and the remaining weights are
//! scaled back up to the configured total. Stopwords take a multiplicative
//! penalty. The result is rounded to six decimals and clamped to [0, 1].

use crate::config::Signal;
use crate::lexical::is_stopword;
use crate::store::types::{round6, PatternRecord};
use std::collections::{BTreeMap, BTreeSet};

/// Min-max normalize to [0, 1]; all-equal input maps to 1.0
pub fn normalize_min_max(values: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    if values.is_empty() {
        return BTreeMap::new();
    }
    let min = values.values().copied().fold(f64::INFINITY, f64::min);
    let max = values.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|(k, v)| {
            let norm = if range.abs() < f64::EPSILON {
                1.0
            } else {
                (v - min) / range
            };
            (k.clone(), norm)
        })
        .collect()
}

/// Composite weights applied to the patterns table
#[derive(Debug, Clone)]
pub struct CompositeScorer<'a> {
    weights: &'a BTreeMap<Signal, f64>,
    stopword_penalty: f64,
}

impl<'a> CompositeScorer<'a> {
    pub fn new(weights: &'a BTreeMap<Signal, f64>, stopword_penalty: f64) -> Self {
        Self {
            weights,
            stopword_penalty,
        }
    }

    /// Weights actually applied, given the signals that produced scores
    pub fn effective_weights(&self, available: &BTreeSet<Signal>) -> BTreeMap<Signal, f64> {
        let configured: f64 = self.weights.values().filter(|w| **w > 0.0).sum();
        let active: BTreeMap<Signal, f64> = self
            .weights
            .iter()
            .filter(|(signal, weight)| **weight > 0.0 && available.contains(signal))
            .map(|(signal, weight)| (*signal, *weight))
            .collect();
        let active_total: f64 = active.values().sum();
        if active_total <= 0.0 {
            return BTreeMap::new();
        }
        let scale = configured / active_total;
        active.into_iter().map(|(s, w)| (s, w * scale)).collect()
    }

    /// Composite score for every pattern
    pub fn score(
        &self,
        patterns: &BTreeMap<String, PatternRecord>,
        available: &BTreeSet<Signal>,
    ) -> BTreeMap<String, f64> {
        let weights = self.effective_weights(available);
        if weights.len() < self.weights.values().filter(|w| **w > 0.0).count() {
            tracing::debug!(
                active = weights.len(),
                "Composite weights rescaled over available signals"
            );
        }

        let normalized: BTreeMap<Signal, BTreeMap<String, f64>> = weights
            .keys()
            .map(|signal| {
                let raw: BTreeMap<String, f64> = patterns
                    .iter()
                    .map(|(text, record)| {
                        (text.clone(), record.scores.get(*signal).unwrap_or(0.0))
                    })
                    .collect();
                (*signal, normalize_min_max(&raw))
            })
            .collect();

        patterns
            .iter()
            .map(|(text, record)| {
                let mut total: f64 = weights
                    .iter()
                    .map(|(signal, weight)| {
                        let value = normalized
                            .get(signal)
                            .and_then(|scores| scores.get(text))
                            .copied()
                            .unwrap_or(0.0);
                        value * weight
                    })
                    .sum();
                if record.is_stopword || is_stopword(text) {
                    total *= self.stopword_penalty;
                }
                (text.clone(), round6(total).clamp(0.0, 1.0))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> BTreeMap<Signal, f64> {
        let mut w = BTreeMap::new();
        w.insert(Signal::Bm25, 0.4);
        w.insert(Signal::Pmi, 0.3);
        w.insert(Signal::Ebbinghaus, 0.3);
        w
    }

    fn record(bm25: f64, pmi: f64, ebb: f64) -> PatternRecord {
        let mut r = PatternRecord::new(1, "2025-01-01");
        r.scores.set(Signal::Bm25, bm25);
        r.scores.set(Signal::Pmi, pmi);
        r.scores.set(Signal::Ebbinghaus, ebb);
        r
    }

    fn all_signals() -> BTreeSet<Signal> {
        [Signal::Bm25, Signal::Pmi, Signal::Ebbinghaus].into_iter().collect()
    }

    #[test]
    fn test_normalize_min_max() {
        let mut raw = BTreeMap::new();
        raw.insert("a".to_string(), 2.0);
        raw.insert("b".to_string(), 4.0);
        raw.insert("c".to_string(), 3.0);
        let norm = normalize_min_max(&raw);
        assert_eq!(norm["a"], 0.0);
        assert_eq!(norm["b"], 1.0);
        assert_eq!(norm["c"], 0.5);
    }

    #[test]
    fn test_normalize_equal_values() {
        let mut raw = BTreeMap::new();
        raw.insert("a".to_string(), 7.0);
        raw.insert("b".to_string(), 7.0);
        assert!(normalize_min_max(&raw).values().all(|v| *v == 1.0));
    }

    #[test]
    fn test_ranking_and_bounds() {
        let w = weights();
        let scorer = CompositeScorer::new(&w, 0.5);
        let mut patterns = BTreeMap::new();
        patterns.insert("alpha".to_string(), record(10.0, 5.0, 0.9));
        patterns.insert("beta".to_string(), record(5.0, 2.0, 0.5));
        patterns.insert("gamma".to_string(), record(1.0, 0.0, 0.1));

        let scores = scorer.score(&patterns, &all_signals());
        assert_eq!(scores["alpha"], 1.0);
        assert_eq!(scores["gamma"], 0.0);
        assert!(scores["alpha"] > scores["beta"] && scores["beta"] > scores["gamma"]);
        assert!(scores.values().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_stopword_penalty() {
        let w = weights();
        let scorer = CompositeScorer::new(&w, 0.5);
        let mut patterns = BTreeMap::new();
        patterns.insert("the".to_string(), record(10.0, 5.0, 0.9));
        patterns.insert("deploy".to_string(), record(1.0, 0.0, 0.1));
        let scores = scorer.score(&patterns, &all_signals());
        assert_eq!(scores["the"], 0.5);
    }

    #[test]
    fn test_missing_signal_rescales_weights() {
        let w = weights();
        let scorer = CompositeScorer::new(&w, 0.5);
        let available: BTreeSet<Signal> = [Signal::Bm25, Signal::Ebbinghaus].into_iter().collect();
        let effective = scorer.effective_weights(&available);
        assert_eq!(effective.len(), 2);
        let total: f64 = effective.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((effective[&Signal::Bm25] - 0.4 / 0.7).abs() < 1e-12);

        let mut patterns = BTreeMap::new();
        patterns.insert("alpha".to_string(), record(10.0, 0.0, 0.9));
        patterns.insert("beta".to_string(), record(1.0, 0.0, 0.1));
        let scores = scorer.score(&patterns, &available);
        assert_eq!(scores["alpha"], 1.0);
    }

    #[test]
    fn test_no_available_signals_scores_zero() {
        let w = weights();
        let scorer = CompositeScorer::new(&w, 0.5);
        let mut patterns = BTreeMap::new();
        patterns.insert("alpha".to_string(), record(1.0, 1.0, 1.0));
        let scores = scorer.score(&patterns, &BTreeSet::new());
        assert_eq!(scores["alpha"], 0.0);
    }
}
