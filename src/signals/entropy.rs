//! Shannon-entropy diversity
//!
//! `H = -sum(p * log2 p)` over the empirical distribution of a pattern's
//! occurrences across one context dimension, normalized by
//! `log2(max_contexts)`. A pattern seen in one context scores 0; one spread
//! evenly over `max_contexts` contexts scores 1.

use crate::config::{Aggregation, ContextKey, EntropyConfig};
use crate::error::{Error, Result};
use crate::store::types::{round6, PatternRecord};
use std::collections::{BTreeMap, HashMap};

const PROBABILITY_SUM_MIN: f64 = 0.99;
const PROBABILITY_SUM_MAX: f64 = 1.01;

/// Entropy in bits of a probability vector; the vector must sum to ~1
pub fn entropy(probabilities: &[f64]) -> Result<f64> {
    if probabilities.is_empty() {
        return Ok(0.0);
    }
    let total: f64 = probabilities.iter().sum();
    if !(PROBABILITY_SUM_MIN..=PROBABILITY_SUM_MAX).contains(&total) {
        return Err(Error::InvalidParameter(format!(
            "probabilities must sum to 1.0, got {}",
            total
        )));
    }
    let h: f64 = probabilities
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.log2())
        .sum();
    Ok(h)
}

/// Entropy in bits of a list of context labels
pub fn label_entropy<'a, I>(labels: I) -> Result<f64>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for label in labels {
        *counts.entry(label.as_str()).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return Ok(0.0);
    }
    let probabilities: Vec<f64> = counts
        .values()
        .map(|c| *c as f64 / total as f64)
        .collect();
    entropy(&probabilities)
}

fn dimension_entropy(record: &PatternRecord, key: ContextKey) -> Result<f64> {
    match key {
        ContextKey::Sessions => label_entropy(&record.sessions),
        ContextKey::Contexts => label_entropy(record.contexts()),
    }
}

/// Raw entropy of one pattern aggregated over `keys`
pub fn pattern_entropy(
    record: &PatternRecord,
    keys: &[ContextKey],
    aggregation: Aggregation,
) -> Result<f64> {
    let values = keys
        .iter()
        .map(|key| dimension_entropy(record, *key))
        .collect::<Result<Vec<f64>>>()?;
    if values.is_empty() {
        return Ok(0.0);
    }
    let combined = match aggregation {
        Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
        Aggregation::Max => values.iter().copied().fold(0.0, f64::max),
    };
    Ok(combined)
}

/// Divide by `log2(max_contexts)`; a single-context maximum maps everything to 0
pub fn normalize(raw: f64, max_contexts: u32) -> Result<f64> {
    if max_contexts == 0 {
        return Err(Error::InvalidParameter(
            "max_contexts must be positive".to_string(),
        ));
    }
    let max_entropy = f64::from(max_contexts).log2();
    if max_entropy == 0.0 {
        return Ok(0.0);
    }
    Ok(raw / max_entropy)
}

/// Normalized diversity score per pattern
pub fn entropy_scores(
    patterns: &BTreeMap<String, PatternRecord>,
    config: &EntropyConfig,
) -> Result<BTreeMap<String, f64>> {
    let mut scores = BTreeMap::new();
    for (text, record) in patterns {
        let raw = pattern_entropy(record, &config.context_keys, config.aggregation)?;
        scores.insert(text.clone(), round6(normalize(raw, config.max_contexts)?));
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_sessions(sessions: &[&str]) -> PatternRecord {
        let mut record = PatternRecord::default();
        for s in sessions {
            record.observe(1, s);
        }
        record
    }

    #[test]
    fn test_entropy_values() {
        assert_eq!(entropy(&[0.25; 4]).unwrap(), 2.0);
        assert_eq!(entropy(&[1.0]).unwrap(), 0.0);
        assert_eq!(entropy(&[0.5, 0.5]).unwrap(), 1.0);
        assert!(entropy(&[0.5, 0.2]).is_err());
        assert_eq!(entropy(&[]).unwrap(), 0.0);
    }

    #[test]
    fn test_label_entropy_uniform_over_k() {
        let labels: Vec<String> = (0..8).map(|i| format!("s{}", i)).collect();
        assert!((label_entropy(&labels).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_label_entropy_skewed() {
        let labels: Vec<String> = ["a", "a", "a", "b"].iter().map(|s| s.to_string()).collect();
        assert!((label_entropy(&labels).unwrap() - 0.811278).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        assert!((normalize(2.0, 4).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(normalize(2.0, 1).unwrap(), 0.0);
        assert!(normalize(1.0, 0).is_err());
    }

    #[test]
    fn test_aggregation_over_dimensions() {
        let mut record = record_with_sessions(&["2025-01-01", "2025-01-02"]);
        record.set_contexts(vec!["one"], 5);
        let keys = [ContextKey::Sessions, ContextKey::Contexts];
        assert_eq!(pattern_entropy(&record, &keys, Aggregation::Mean).unwrap(), 0.5);
        assert_eq!(pattern_entropy(&record, &keys, Aggregation::Max).unwrap(), 1.0);
    }

    #[test]
    fn test_entropy_scores_in_unit_interval() {
        let mut patterns = BTreeMap::new();
        patterns.insert("single".to_string(), record_with_sessions(&["2025-01-01"]));
        patterns.insert(
            "spread".to_string(),
            record_with_sessions(&["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04"]),
        );
        let config = EntropyConfig {
            max_contexts: 4,
            ..EntropyConfig::default()
        };
        let scores = entropy_scores(&patterns, &config).unwrap();
        assert_eq!(scores["single"], 0.0);
        assert_eq!(scores["spread"], 1.0);
    }
}
