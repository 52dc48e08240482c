//! Pattern observation batches
//!
//! A batch carries one session's pattern counts, the archive contexts of its
//! strongest patterns and, optionally, a fresh co-occurrence table. Applying
//! a batch adds counts, replaces the contexts of the listed patterns and
//! replaces the co-occurrence table wholesale.

use crate::archive::ArchiveDocument;
use crate::engine::types::UpdateStats;
use crate::memory::ThompsonSampler;
use crate::store::types::{CooccurrencePair, MemoryState, PatternRecord};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observations from one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternBatch {
    /// Session date, `YYYY-MM-DD`
    pub date: String,
    #[serde(default)]
    pub observations: BTreeMap<String, u64>,
    #[serde(default)]
    pub contexts: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub cooccurrences: Option<Vec<CooccurrencePair>>,
}

impl PatternBatch {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Self::default()
        }
    }

    pub fn observe(mut self, pattern: impl Into<String>, count: u64) -> Self {
        *self.observations.entry(pattern.into()).or_insert(0) += count;
        self
    }

    pub fn context(mut self, pattern: impl Into<String>, context: impl Into<String>) -> Self {
        self.contexts
            .entry(pattern.into())
            .or_default()
            .push(context.into());
        self
    }

    pub fn cooccurrences(mut self, pairs: Vec<CooccurrencePair>) -> Self {
        self.cooccurrences = Some(pairs);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.contexts.is_empty() && self.cooccurrences.is_none()
    }
}

/// Fold `batch` into `state`. Zero counts are ignored; contexts for patterns
/// absent from the store are dropped.
pub fn apply_batch(state: &mut MemoryState, batch: &PatternBatch, context_cap: usize) -> UpdateStats {
    let mut stats = UpdateStats {
        date: batch.date.clone(),
        ..UpdateStats::default()
    };

    for (pattern, &count) in &batch.observations {
        if count == 0 {
            continue;
        }
        match state.patterns.get_mut(pattern) {
            Some(record) => {
                record.observe(count, &batch.date);
                stats.updated_patterns += 1;
            }
            None => {
                state
                    .patterns
                    .insert(pattern.clone(), PatternRecord::new(count, &batch.date));
                stats.new_patterns += 1;
            }
        }
    }

    for (pattern, contexts) in &batch.contexts {
        if contexts.is_empty() {
            continue;
        }
        match state.patterns.get_mut(pattern) {
            Some(record) => {
                record.set_contexts(contexts.iter().cloned(), context_cap);
                stats.contexts_updated += 1;
            }
            None => tracing::debug!(pattern = %pattern, "Dropped contexts for unknown pattern"),
        }
    }

    if let Some(pairs) = &batch.cooccurrences {
        state.cooccurrences = pairs.clone();
    }
    stats.cooccurrences = state.cooccurrences.len();
    stats.total_patterns = state.patterns.len();

    tracing::info!(
        date = %stats.date,
        new = stats.new_patterns,
        updated = stats.updated_patterns,
        total = stats.total_patterns,
        "Updated patterns"
    );
    stats
}

/// Patterns whose contexts get refreshed, at most `limit`.
///
/// Patterns carrying a Thompson belief are ranked by one draw each. When none
/// do, the highest counts win, with `pending` observations added on top of
/// the stored counts.
pub fn context_candidates<R: Rng>(
    state: &MemoryState,
    pending: &BTreeMap<String, u64>,
    limit: usize,
    sampler: &mut ThompsonSampler<R>,
) -> Vec<String> {
    let arms: Vec<(String, _)> = state
        .patterns
        .iter()
        .filter_map(|(text, record)| record.thompson_state.map(|belief| (text.clone(), belief)))
        .collect();

    if !arms.is_empty() {
        return sampler
            .rank(&arms)
            .into_iter()
            .take(limit)
            .map(|(text, _)| text)
            .collect();
    }

    let mut counts = state.pattern_counts();
    for (pattern, count) in pending {
        *counts.entry(pattern.clone()).or_insert(0) += count;
    }
    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(text, _)| text).collect()
}

fn is_separator(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '-')
}

/// Lines around each case-insensitive mention of `pattern`, oldest archive
/// first: the previous line, the matching line and the next line. Blank
/// lines and `--` separators are skipped; repeats are kept once.
pub fn extract_contexts(pattern: &str, documents: &[ArchiveDocument]) -> Vec<String> {
    let needle = pattern.to_lowercase();
    let mut contexts: Vec<String> = Vec::new();
    if needle.is_empty() {
        return contexts;
    }

    for document in documents {
        let lines: Vec<&str> = document.content.lines().map(str::trim).collect();
        for (i, line) in lines.iter().enumerate() {
            if !line.to_lowercase().contains(&needle) {
                continue;
            }
            let start = i.saturating_sub(1);
            let end = (i + 1).min(lines.len() - 1);
            for neighbour in &lines[start..=end] {
                if neighbour.is_empty() || is_separator(neighbour) {
                    continue;
                }
                if !contexts.iter().any(|c| c == neighbour) {
                    contexts.push(neighbour.to_string());
                }
            }
        }
    }
    contexts
}
