//! Gated BM25 habit search
//!
//! Notes must clear a confidence gate and a freshness gate. The survivors form
//! their own BM25 corpus, and each is ranked by
//! `bm25 * confidence.mean * freshness`.

use crate::config::HabitsConfig;
use crate::habits::feedback::note_freshness;
use crate::lexical::bm25::{score_document, Bm25Params};
use crate::lexical::{Corpus, Tokenizer};
use crate::store::types::Note;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// Gates and result size for a habit search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HabitFilters {
    pub min_confidence: f64,
    pub min_freshness: f64,
    pub freshness_half_life_days: f64,
    pub top_k: usize,
}

impl Default for HabitFilters {
    fn default() -> Self {
        Self::from(&HabitsConfig::default())
    }
}

impl From<&HabitsConfig> for HabitFilters {
    fn from(config: &HabitsConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            min_freshness: config.min_freshness,
            freshness_half_life_days: config.freshness_half_life_days,
            top_k: config.top_k,
        }
    }
}

/// One ranked habit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitMatch {
    pub note_id: String,
    pub text: String,
    pub cluster_id: Option<String>,
    pub bm25_score: f64,
    pub confidence: f64,
    pub freshness: f64,
    pub final_score: f64,
}

/// Rank notes for `query`, best first, at most `filters.top_k`
pub fn search_habits(
    notes: &[Note],
    query: &str,
    filters: &HabitFilters,
    tokenizer: &Tokenizer,
    params: Bm25Params,
    now: DateTime<Utc>,
) -> Vec<HabitMatch> {
    let gated: Vec<(&Note, f64)> = notes
        .iter()
        .filter_map(|note| {
            let freshness = note_freshness(
                note.last_used.as_deref(),
                now,
                filters.freshness_half_life_days,
            );
            let passes = note.confidence.mean >= filters.min_confidence
                && freshness >= filters.min_freshness;
            passes.then_some((note, freshness))
        })
        .collect();

    if gated.is_empty() {
        return Vec::new();
    }

    let corpus: Corpus = gated
        .iter()
        .map(|(note, _)| tokenizer.tokenize(&note.text))
        .collect();
    let query_terms = tokenizer.tokenize(query);

    let mut matches: Vec<HabitMatch> = gated
        .iter()
        .zip(corpus.documents())
        .map(|((note, freshness), tokens)| {
            let bm25_score = score_document(&query_terms, tokens, &corpus, params);
            let confidence = note.confidence.mean;
            HabitMatch {
                note_id: note.id.clone(),
                text: note.text.clone(),
                cluster_id: note.cluster_id.clone(),
                bm25_score,
                confidence,
                freshness: *freshness,
                final_score: bm25_score * confidence * freshness,
            }
        })
        .collect();

    matches.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
    });
    matches.truncate(filters.top_k);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BayesianState;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
    }

    fn note(id: &str, text: &str, mean: f64) -> Note {
        Note {
            id: id.to_string(),
            text: text.to_string(),
            session_date: "2025-01-01".to_string(),
            timestamp: "2025-01-01T09:00:00Z".to_string(),
            source_archive: "2025-01-01.md".to_string(),
            cluster_id: None,
            confidence: BayesianState::new(mean, 0.04).unwrap(),
            use_count: 0,
            success_count: 0,
            failure_count: 0,
            last_used: None,
            freshness: 0.5,
        }
    }

    #[test]
    fn test_overlap_beats_higher_confidence() {
        let notes = vec![
            note("n1", "Run tests before commit", 0.6),
            note("n2", "Check documentation", 0.7),
        ];
        let filters = HabitFilters {
            min_confidence: 0.5,
            ..HabitFilters::default()
        };
        let tok = Tokenizer::new().unwrap();
        let results = search_habits(&notes, "run tests", &filters, &tok, Bm25Params::default(), now());

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].note_id, "n1");
        assert!(results[0].final_score > 0.0);
        assert_eq!(results[1].note_id, "n2");
        assert_eq!(results[1].bm25_score, 0.0);
        assert_eq!(results[0].freshness, 0.5);
    }

    #[test]
    fn test_gates_exclude_notes() {
        let mut stale = note("stale", "run tests nightly", 0.9);
        stale.last_used = Some("2024-01-01T00:00:00Z".to_string());
        let notes = vec![
            note("weak", "run tests", 0.3),
            stale,
            note("ok", "run tests quickly", 0.6),
        ];
        let tok = Tokenizer::new().unwrap();
        let results = search_habits(
            &notes,
            "run tests",
            &HabitFilters::default(),
            &tok,
            Bm25Params::default(),
            now(),
        );
        let ids: Vec<&str> = results.iter().map(|r| r.note_id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[test]
    fn test_top_k_and_empty() {
        let notes: Vec<Note> = (0..10)
            .map(|i| note(&format!("n{}", i), "run tests", 0.6))
            .collect();
        let tok = Tokenizer::new().unwrap();
        let filters = HabitFilters {
            top_k: 3,
            ..HabitFilters::default()
        };
        let results = search_habits(&notes, "tests", &filters, &tok, Bm25Params::default(), now());
        assert_eq!(results.len(), 3);
        assert!(search_habits(&[], "tests", &filters, &tok, Bm25Params::default(), now()).is_empty());
    }
}
