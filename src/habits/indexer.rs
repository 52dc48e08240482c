//! Note extraction, deduplication and clustering
//!
//! Notes come from `[HH:MM] text` archive lines. Near-duplicates are dropped
//! (first seen wins), texts already indexed are skipped, and the cluster
//! table is rebuilt from scratch over every note on each pass.

use crate::archive::ArchiveDocument;
use crate::lexical::Tokenizer;
use crate::memory::BayesianState;
use crate::similarity::similarity_ratio;
use crate::store::types::{format_timestamp, Cluster, MemoryState, Note};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A note parsed from an archive, before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedNote {
    pub text: String,
    pub timestamp: String,
    pub session_date: String,
    pub source_archive: String,
}

/// Counts from one indexing pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub extracted: usize,
    pub deduplicated: usize,
    pub new_notes: usize,
    pub total_notes: usize,
    pub clusters: usize,
}

/// Parse every `[HH:MM] text` line of one archive
pub fn extract_notes(tokenizer: &Tokenizer, document: &ArchiveDocument) -> Vec<ExtractedNote> {
    document
        .content
        .lines()
        .filter_map(|line| tokenizer.parse_note_line(line))
        .map(|line| ExtractedNote {
            text: line.text,
            timestamp: format!(
                "{}T{:02}:{:02}:00Z",
                document.date, line.hour, line.minute
            ),
            session_date: document.date.clone(),
            source_archive: document.file_name.clone(),
        })
        .collect()
}

/// Drop notes at least `threshold` similar to an earlier kept note
pub fn deduplicate(notes: Vec<ExtractedNote>, threshold: f64) -> Vec<ExtractedNote> {
    let mut unique: Vec<ExtractedNote> = Vec::new();
    for note in notes {
        let duplicate = unique
            .iter()
            .any(|kept| similarity_ratio(&note.text, &kept.text) >= threshold);
        if !duplicate {
            unique.push(note);
        }
    }
    unique
}

/// `n_{YYYYMMDD}_{seq:03}`
pub fn note_id(session_date: &str, seq: u32) -> String {
    format!("n_{}_{:03}", session_date.replace('-', ""), seq)
}

/// Single-linkage clustering against each cluster's first member.
///
/// A note joins the most similar cluster at or above `threshold` (earliest
/// cluster on a tie); otherwise it starts a new one. Ids are `c001`, `c002`...
pub fn cluster_notes(notes: &[Note], threshold: f64) -> BTreeMap<String, Vec<String>> {
    let mut clusters: Vec<(String, String, Vec<String>)> = Vec::new();

    for note in notes {
        let mut best: Option<usize> = None;
        let mut best_similarity = 0.0;
        for (i, (_, representative, _)) in clusters.iter().enumerate() {
            let similarity = similarity_ratio(&note.text, representative);
            if similarity >= threshold && similarity > best_similarity {
                best = Some(i);
                best_similarity = similarity;
            }
        }
        match best {
            Some(i) => clusters[i].2.push(note.id.clone()),
            None => {
                let id = format!("c{:03}", clusters.len() + 1);
                clusters.push((id, note.text.clone(), vec![note.id.clone()]));
            }
        }
    }

    clusters
        .into_iter()
        .map(|(id, _, members)| (id, members))
        .collect()
}

/// Index every archive into `state.notes` and rebuild `state.clusters`
pub fn index_notes(
    state: &mut MemoryState,
    tokenizer: &Tokenizer,
    documents: &[ArchiveDocument],
    prior: BayesianState,
    dedup_threshold: f64,
    cluster_threshold: f64,
    now: DateTime<Utc>,
) -> IndexStats {
    let extracted: Vec<ExtractedNote> = documents
        .iter()
        .flat_map(|doc| extract_notes(tokenizer, doc))
        .collect();
    let extracted_count = extracted.len();
    let unique = deduplicate(extracted, dedup_threshold);
    let deduplicated = unique.len();

    let mut known_texts: HashSet<String> = state.notes.iter().map(|n| n.text.clone()).collect();
    let mut next_seq: HashMap<String, u32> = HashMap::new();
    for note in &state.notes {
        let seq = note.sequence().unwrap_or(0);
        let entry = next_seq.entry(note.session_date.clone()).or_insert(0);
        *entry = (*entry).max(seq);
    }

    let mut new_notes = 0;
    for note in unique {
        if !known_texts.insert(note.text.clone()) {
            continue;
        }
        let seq = next_seq.entry(note.session_date.clone()).or_insert(0);
        *seq += 1;
        state.notes.push(Note {
            id: note_id(&note.session_date, *seq),
            text: note.text,
            session_date: note.session_date,
            timestamp: note.timestamp,
            source_archive: note.source_archive,
            cluster_id: None,
            confidence: prior,
            use_count: 0,
            success_count: 0,
            failure_count: 0,
            last_used: None,
            freshness: 0.5,
        });
        new_notes += 1;
    }

    rebuild_clusters(state, cluster_threshold, now);

    let stats = IndexStats {
        extracted: extracted_count,
        deduplicated,
        new_notes,
        total_notes: state.notes.len(),
        clusters: state.clusters.len(),
    };
    tracing::info!(
        extracted = stats.extracted,
        new_notes = stats.new_notes,
        total_notes = stats.total_notes,
        clusters = stats.clusters,
        "Indexed notes"
    );
    stats
}

/// Recompute clusters over all notes and stamp each note's `cluster_id`
pub fn rebuild_clusters(state: &mut MemoryState, threshold: f64, now: DateTime<Utc>) {
    let assignments = cluster_notes(&state.notes, threshold);
    let created_at = format_timestamp(now);

    let mut membership: HashMap<&str, &str> = HashMap::new();
    for (cluster_id, members) in &assignments {
        for member in members {
            membership.insert(member.as_str(), cluster_id.as_str());
        }
    }
    for note in state.notes.iter_mut() {
        note.cluster_id = membership.get(note.id.as_str()).map(|c| c.to_string());
    }

    let means: HashMap<&str, f64> = state
        .notes
        .iter()
        .map(|n| (n.id.as_str(), n.confidence.mean))
        .collect();
    state.clusters = assignments
        .iter()
        .map(|(cluster_id, members)| {
            let total: f64 = members
                .iter()
                .filter_map(|m| means.get(m.as_str()))
                .sum();
            let confidence = if members.is_empty() {
                0.0
            } else {
                total / members.len() as f64
            };
            (
                cluster_id.clone(),
                Cluster {
                    label: None,
                    note_ids: members.clone(),
                    confidence,
                    created_at: created_at.clone(),
                },
            )
        })
        .collect();
}
