//! Near-duplicate detection and destructive pattern merging
//!
//! Similar pairs come from a BK-tree built over the patterns that pass the
//! minimum-count filter. Merging folds one record into another and removes
//! the merged-away key, so repeating a merge fails with `EntityNotFound`
//! instead of double-counting.

use crate::error::{Error, Result};
use crate::similarity::BkTree;
use crate::store::types::MemoryState;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Two patterns within the distance threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarPatternPair {
    /// Members in alphabetical order
    pub patterns: [String; 2],
    pub distance: usize,
    pub counts: [u64; 2],
    pub scores: [f64; 2],
    pub total_count: u64,
    /// Suggested survivor: higher count, alphabetically first on a tie
    pub keep: String,
}

impl SimilarPatternPair {
    /// The member that would be merged away
    pub fn merge(&self) -> &str {
        if self.keep == self.patterns[0] {
            &self.patterns[1]
        } else {
            &self.patterns[0]
        }
    }
}

/// Find pattern pairs within `threshold` edits, largest combined count first.
///
/// Patterns below `min_count` are excluded before the tree is built.
pub fn detect_similar_pairs(
    state: &MemoryState,
    threshold: usize,
    min_count: u64,
) -> Vec<SimilarPatternPair> {
    let eligible: BTreeMap<&String, (u64, f64)> = state
        .patterns
        .iter()
        .filter(|(_, r)| r.count >= min_count)
        .map(|(text, r)| (text, (r.count, r.composite_score)))
        .collect();

    if eligible.len() < 2 {
        return Vec::new();
    }

    let tree: BkTree = eligible.keys().map(|k| k.as_str()).collect();
    let mut pairs: Vec<SimilarPatternPair> = tree
        .find_similar_pairs(threshold)
        .into_iter()
        .filter(|p| p.distance > 0)
        .filter_map(|p| {
            let (c1, s1) = *eligible.get(&p.first)?;
            let (c2, s2) = *eligible.get(&p.second)?;
            let keep = if c2 > c1 {
                p.second.clone()
            } else {
                p.first.clone()
            };
            Some(SimilarPatternPair {
                patterns: [p.first, p.second],
                distance: p.distance,
                counts: [c1, c2],
                scores: [s1, s2],
                total_count: c1 + c2,
                keep,
            })
        })
        .collect();

    pairs.sort_by(|a, b| b.total_count.cmp(&a.total_count));
    pairs
}

/// Fold `merge` into `keep` and delete `merge`. Returns the new count.
///
/// References to the merged-away text are dropped from co-occurrences and
/// promotion candidates.
pub fn merge_patterns(
    state: &mut MemoryState,
    keep: &str,
    merge: &str,
    context_cap: usize,
) -> Result<u64> {
    if keep == merge {
        return Err(Error::InvalidParameter(format!(
            "cannot merge pattern '{}' into itself",
            keep
        )));
    }
    if !state.patterns.contains_key(keep) {
        return Err(Error::EntityNotFound(format!("Pattern '{}' not found", keep)));
    }
    let merged = state
        .patterns
        .remove(merge)
        .ok_or_else(|| Error::EntityNotFound(format!("Pattern '{}' not found", merge)))?;

    let record = state
        .patterns
        .get_mut(keep)
        .ok_or_else(|| Error::EntityNotFound(format!("Pattern '{}' not found", keep)))?;
    record.absorb(&merged, context_cap);
    let new_count = record.count;

    state.cooccurrences.retain(|pair| !pair.contains(merge));
    state.promotion_candidates.retain(|p| p != merge);

    tracing::debug!(keep, merge, new_count, "Merged pattern");
    Ok(new_count)
}

/// Outcome of one attempted merge in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeDetail {
    pub keep: String,
    pub merge: String,
    pub distance: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a batch consolidation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub merged_count: usize,
    pub details: Vec<MergeDetail>,
    pub final_pattern_count: usize,
    /// Backup taken before merging, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
}

/// Merge every detected pair whose members are both still present.
///
/// Pairs are processed largest combined count first; once a pattern has been
/// merged away, later pairs naming it are skipped.
pub fn consolidate(
    state: &mut MemoryState,
    threshold: usize,
    min_count: u64,
    context_cap: usize,
) -> MergeReport {
    let pairs = detect_similar_pairs(state, threshold, min_count);
    let mut merged_away: HashSet<String> = HashSet::new();
    let mut report = MergeReport::default();

    for pair in &pairs {
        if pair.patterns.iter().any(|p| merged_away.contains(p)) {
            continue;
        }
        let merge = pair.merge().to_string();
        let mut detail = MergeDetail {
            keep: pair.keep.clone(),
            merge: merge.clone(),
            distance: pair.distance,
            new_count: None,
            error: None,
        };
        match merge_patterns(state, &pair.keep, &merge, context_cap) {
            Ok(count) => {
                detail.new_count = Some(count);
                report.merged_count += 1;
                merged_away.insert(merge);
            }
            Err(e) => {
                tracing::warn!("Failed to merge '{}' into '{}': {}", merge, pair.keep, e);
                detail.error = Some(e.to_string());
            }
        }
        report.details.push(detail);
    }

    report.final_pattern_count = state.patterns.len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{CooccurrencePair, PatternRecord};

    fn state(entries: &[(&str, u64, &str)]) -> MemoryState {
        let mut state = MemoryState::default();
        for (text, count, date) in entries {
            state
                .patterns
                .insert(text.to_string(), PatternRecord::new(*count, date));
        }
        state
    }

    #[test]
    fn test_detects_test_tests_pair() {
        let s = state(&[
            ("test", 5, "2025-01-01"),
            ("tests", 3, "2025-01-02"),
            ("testing", 2, "2025-01-03"),
        ]);
        let pairs = detect_similar_pairs(&s, 2, 1);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].patterns, ["test".to_string(), "tests".to_string()]);
        assert_eq!(pairs[0].distance, 1);
        assert_eq!(pairs[0].keep, "test");
        assert_eq!(pairs[0].merge(), "tests");
        assert_eq!(pairs[0].total_count, 8);
    }

    #[test]
    fn test_tie_keeps_alphabetically_first() {
        let s = state(&[("cart", 2, "2025-01-01"), ("care", 2, "2025-01-01")]);
        let pairs = detect_similar_pairs(&s, 1, 1);
        assert_eq!(pairs[0].keep, "care");
    }

    #[test]
    fn test_min_count_filters_before_detection() {
        let s = state(&[("test", 5, "2025-01-01"), ("tests", 1, "2025-01-01")]);
        assert!(detect_similar_pairs(&s, 2, 2).is_empty());
        assert_eq!(detect_similar_pairs(&s, 2, 1).len(), 1);
    }

    #[test]
    fn test_end_to_end_consolidation() {
        let mut s = state(&[
            ("test", 5, "2025-01-01"),
            ("tests", 3, "2025-01-02"),
            ("testing", 2, "2025-01-03"),
        ]);
        let report = consolidate(&mut s, 2, 1, 5);

        assert_eq!(report.merged_count, 1);
        assert_eq!(report.final_pattern_count, 2);
        assert_eq!(report.details[0].new_count, Some(8));

        let test = &s.patterns["test"];
        assert_eq!(test.count, 8);
        assert_eq!(test.sessions.len(), 2);
        assert_eq!(test.last_seen.as_deref(), Some("2025-01-02"));
        assert_eq!(s.patterns["testing"].count, 2);
        assert!(!s.patterns.contains_key("tests"));
    }

    #[test]
    fn test_merge_is_idempotent_via_absence() {
        let mut s = state(&[("test", 5, "2025-01-01"), ("tests", 3, "2025-01-02")]);
        assert_eq!(merge_patterns(&mut s, "test", "tests", 5).unwrap(), 8);

        let before = s.clone();
        let err = merge_patterns(&mut s, "test", "tests", 5).unwrap_err();
        assert!(matches!(err, Error::EntityNotFound(_)));
        assert_eq!(s, before);
    }

    #[test]
    fn test_merge_missing_keep_has_no_side_effects() {
        let mut s = state(&[("tests", 3, "2025-01-02")]);
        let before = s.clone();
        let err = merge_patterns(&mut s, "test", "tests", 5).unwrap_err();
        assert_eq!(err.to_string(), "Not found: Pattern 'test' not found");
        assert_eq!(s, before);
    }

    #[test]
    fn test_merge_drops_references() {
        let mut s = state(&[
            ("test", 5, "2025-01-01"),
            ("tests", 3, "2025-01-02"),
            ("deploy", 3, "2025-01-02"),
        ]);
        s.cooccurrences
            .push(CooccurrencePair::new("deploy", "tests", 2).unwrap());
        s.cooccurrences
            .push(CooccurrencePair::new("deploy", "test", 2).unwrap());
        s.promotion_candidates = vec!["tests".to_string(), "test".to_string()];

        merge_patterns(&mut s, "test", "tests", 5).unwrap();
        assert_eq!(s.cooccurrences.len(), 1);
        assert_eq!(s.promotion_candidates, vec!["test".to_string()]);
    }

    #[test]
    fn test_chained_pairs_skip_merged_members() {
        let mut s = state(&[
            ("abcd", 5, "2025-01-01"),
            ("abce", 4, "2025-01-01"),
            ("abcf", 1, "2025-01-01"),
        ]);
        let report = consolidate(&mut s, 1, 1, 5);
        assert_eq!(report.final_pattern_count, 1);
        assert_eq!(s.patterns["abcd"].count, 10);
    }

    #[test]
    fn test_fewer_than_two_patterns() {
        let s = state(&[("solo", 5, "2025-01-01")]);
        assert!(detect_similar_pairs(&s, 2, 1).is_empty());
    }
}
