//! Pointwise mutual information over co-occurring pattern pairs
//!
//! `pmi(A, B) = ln((n_ab / N) / ((n_a / N) * (n_b / N)))`, with any zero count
//! mapping to 0.

use crate::store::types::{round6, CooccurrencePair};
use std::collections::BTreeMap;

/// PMI of one pair given its joint count, marginal counts and total `n`
pub fn pmi(count_ab: u64, count_a: u64, count_b: u64, total: u64) -> f64 {
    if count_ab == 0 || count_a == 0 || count_b == 0 || total == 0 {
        return 0.0;
    }
    let n = total as f64;
    let p_ab = count_ab as f64 / n;
    let p_a = count_a as f64 / n;
    let p_b = count_b as f64 / n;
    (p_ab / (p_a * p_b)).ln()
}

/// Stamp `pmi_score` on every pair from the pattern counts
pub fn score_pairs(pairs: &mut [CooccurrencePair], counts: &BTreeMap<String, u64>, total: u64) {
    for pair in pairs.iter_mut() {
        let (a, b) = pair.words();
        let count_a = counts.get(a).copied().unwrap_or(0);
        let count_b = counts.get(b).copied().unwrap_or(0);
        pair.pmi_score = Some(round6(pmi(pair.count, count_a, count_b, total)));
    }
}

/// Per-pattern PMI in [0, 1].
///
/// A pattern's raw value is the mean PMI of the pairs it belongs to whose
/// count reaches `min_cooccurrence`, 0 when it has none. Raw values are then
/// min-max normalized across `patterns`; all-equal values map to 0.5. With no
/// pairs at all every pattern scores 0.
pub fn pattern_pmi_scores<'a, I>(
    patterns: I,
    pairs: &[CooccurrencePair],
    min_cooccurrence: u64,
) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for pair in pairs.iter().filter(|p| p.count >= min_cooccurrence) {
        let value = pair.pmi_score.unwrap_or(0.0);
        let (a, b) = pair.words();
        for word in [a, b] {
            let entry = sums.entry(word).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let raw: BTreeMap<String, f64> = patterns
        .into_iter()
        .map(|p| {
            let mean = sums
                .get(p.as_str())
                .map(|(sum, n)| sum / *n as f64)
                .unwrap_or(0.0);
            (p.clone(), mean)
        })
        .collect();

    if pairs.is_empty() {
        return raw.into_keys().map(|k| (k, 0.0)).collect();
    }
    normalize_pmi(raw)
}

fn normalize_pmi(raw: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let min = raw.values().copied().fold(f64::INFINITY, f64::min);
    let max = raw.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    raw.into_iter()
        .map(|(k, v)| {
            let norm = if range.abs() < f64::EPSILON {
                0.5
            } else {
                (v - min) / range
            };
            (k, round6(norm))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_pmi_formula() {
        // ln(18 * 100 / (18 * 18))
        let value = pmi(18, 18, 18, 100);
        assert!((value - (100.0f64 / 18.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_counts_give_zero() {
        assert_eq!(pmi(0, 5, 5, 10), 0.0);
        assert_eq!(pmi(1, 0, 5, 10), 0.0);
        assert_eq!(pmi(1, 5, 0, 10), 0.0);
        assert_eq!(pmi(1, 5, 5, 0), 0.0);
    }

    #[test]
    fn test_score_pairs_uses_pattern_counts() {
        let mut pairs = vec![
            CooccurrencePair::new("test", "deploy", 18).unwrap(),
            CooccurrencePair::new("test", "unknown", 1).unwrap(),
        ];
        score_pairs(&mut pairs, &counts(&[("test", 18), ("deploy", 18)]), 100);
        assert!(pairs[0].pmi_score.unwrap() > 0.0);
        assert_eq!(pairs[1].pmi_score, Some(0.0));
    }

    #[test]
    fn test_pattern_scores_normalized() {
        let mut pairs = vec![
            CooccurrencePair::new("alpha", "beta", 4).unwrap(),
            CooccurrencePair::new("alpha", "gamma", 2).unwrap(),
            CooccurrencePair::new("beta", "delta", 1).unwrap(),
        ];
        pairs[0].pmi_score = Some(2.0);
        pairs[1].pmi_score = Some(1.0);
        pairs[2].pmi_score = Some(5.0);

        let patterns: Vec<String> = ["alpha", "beta", "gamma", "delta", "lonely"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let scores = pattern_pmi_scores(&patterns, &pairs, 2);

        // delta's only pair is below the minimum
        assert_eq!(scores["beta"], 1.0);
        assert_eq!(scores["delta"], 0.0);
        assert_eq!(scores["lonely"], 0.0);
        assert!((scores["alpha"] - 0.75).abs() < 1e-9);
        assert!((scores["gamma"] - 0.5).abs() < 1e-9);
        assert!(scores.values().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_equal_values_normalize_to_half() {
        let mut pairs = vec![CooccurrencePair::new("aaa", "bbb", 3).unwrap()];
        pairs[0].pmi_score = Some(1.2);
        let patterns = vec!["aaa".to_string(), "bbb".to_string()];
        let scores = pattern_pmi_scores(&patterns, &pairs, 1);
        assert_eq!(scores["aaa"], 0.5);
        assert_eq!(scores["bbb"], 0.5);
    }

    #[test]
    fn test_pairs_below_minimum_normalize_to_half() {
        let mut pairs = vec![CooccurrencePair::new("aaa", "bbb", 1).unwrap()];
        pairs[0].pmi_score = Some(0.8);
        let patterns = vec!["aaa".to_string(), "bbb".to_string(), "ccc".to_string()];
        let scores = pattern_pmi_scores(&patterns, &pairs, 2);
        assert!(scores.values().all(|v| *v == 0.5));
    }

    #[test]
    fn test_no_pairs_all_zero() {
        let patterns = vec!["aaa".to_string()];
        let scores = pattern_pmi_scores(&patterns, &[], 1);
        assert_eq!(scores["aaa"], 0.0);
    }
}
