//! The engine: every external operation as a load, compute, save cycle

use crate::archive::{Archive, ArchiveDocument};
use crate::config::{PatmemConfig, Signal};
use crate::consolidate::{self, detect_similar_pairs, MergeReport, SimilarPatternPair};
use crate::engine::batch::{apply_batch, context_candidates, extract_contexts, PatternBatch};
use crate::engine::types::*;
use crate::error::{Error, Result};
use crate::habits::{self, FeedbackResult, HabitFilters, HabitMatch, IndexStats};
use crate::lexical::bm25::{self, Bm25Params};
use crate::lexical::pmi::{pattern_pmi_scores, score_pairs};
use crate::lexical::tfidf::tfidf_scores;
use crate::lexical::{detect_cooccurrences, is_stopword, Corpus, Tokenizer};
use crate::memory::sm2::{is_due, next_review_date, sort_review_queue};
use crate::memory::{BayesianState, Outcome, ReviewItem, ReviewSummary, ThompsonSampler, ThompsonState};
use crate::scoring::{select_candidates, CompositeScorer, PromotionCandidate};
use crate::signals::{ebbinghaus_scores, entropy_scores, time_decay_scores, EbbinghausParams};
use crate::similarity::BkTree;
use crate::store::types::{format_timestamp, parse_date, DATE_FORMAT};
use crate::store::{JsonFileRepository, MemoryState, PromotionInfo, PromotionKind, Repository, Sm2Record};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

// =============================================================================
// Builder
// =============================================================================

/// Builds an [`Engine`] from a configuration
pub struct EngineBuilder {
    config: PatmemConfig,
    archive_dir: Option<PathBuf>,
    now: Option<DateTime<Utc>>,
    seed: Option<u64>,
}

impl EngineBuilder {
    pub fn new(config: PatmemConfig) -> Self {
        Self {
            config,
            archive_dir: None,
            now: None,
            seed: None,
        }
    }

    /// Read and write archives here instead of the configured directory
    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Freeze the clock, for reproducible runs
    pub fn fixed_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Seed the Thompson sampler; overrides the configured seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Engine over the configured JSON store
    pub fn build(self) -> Result<Engine<JsonFileRepository>> {
        let repository = JsonFileRepository::new(
            self.config.storage.tracker_path(),
            self.config.similarity.backup_keep_count,
        );
        self.build_with(repository)
    }

    /// Engine over any repository
    pub fn build_with<R: Repository>(self, repository: R) -> Result<Engine<R>> {
        self.config.validate()?;

        let bm25 = Bm25Params::new(self.config.scoring.bm25.k1, self.config.scoring.bm25.b)?;
        let archive = Archive::new(
            self.archive_dir
                .unwrap_or_else(|| self.config.storage.archive_path()),
        );
        let sampler = ThompsonSampler::with_seed(self.seed.or(self.config.confidence.thompson.seed));

        tracing::debug!(
            archive = %archive.dir().display(),
            fixed_time = self.now.is_some(),
            "Built engine"
        );

        Ok(Engine {
            config: self.config,
            repository,
            archive,
            tokenizer: Tokenizer::new()?,
            bm25,
            fixed_now: self.now,
            sampler,
        })
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Pattern memory over one store and one archive directory.
///
/// Each operation loads the whole store, works on the in-memory value and
/// saves it back once. Read-only operations never save.
pub struct Engine<R: Repository = JsonFileRepository> {
    config: PatmemConfig,
    repository: R,
    archive: Archive,
    tokenizer: Tokenizer,
    bm25: Bm25Params,
    fixed_now: Option<DateTime<Utc>>,
    sampler: ThompsonSampler,
}

impl<R: Repository> Engine<R> {
    pub fn config(&self) -> &PatmemConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Current store, recovered as empty when missing or corrupt
    pub fn load(&self) -> Result<MemoryState> {
        self.repository.load()
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Single entry point for host lifecycle triggers
    pub fn ingest(&mut self, event: LifecycleEvent) -> Result<IngestReport> {
        tracing::debug!(event = event.name(), "Ingesting event");
        match event {
            LifecycleEvent::SessionNotes { date, content } => {
                let path = self.archive.append_session_notes(date, &content)?;
                Ok(IngestReport::SessionNotes { path })
            }
            LifecycleEvent::SessionEnd { date } => Ok(IngestReport::SessionEnd(self.session_end(date)?)),
            LifecycleEvent::Consolidate { threshold } => {
                Ok(IngestReport::Consolidate(self.consolidate(threshold)?))
            }
            LifecycleEvent::Feedback { note_id, outcome } => {
                Ok(IngestReport::Feedback(self.apply_feedback(&note_id, outcome)?))
            }
            LifecycleEvent::Review { pattern, quality } => {
                Ok(IngestReport::Review(self.review_pattern(&pattern, quality)?))
            }
        }
    }

    /// Close a session: index notes, update patterns from the day's archive,
    /// score, reinforce beliefs and refresh note freshness.
    ///
    /// A failing step is reported and the remaining steps still run. The
    /// store is saved once at the end.
    pub fn session_end(&mut self, date: NaiveDate) -> Result<SessionReport> {
        let mut state = self.repository.load()?;
        let mut report = SessionReport {
            date: date.format(DATE_FORMAT).to_string(),
            ..SessionReport::default()
        };

        let indexed = self
            .archive
            .documents()
            .and_then(|documents| self.index_state(&mut state, &documents));
        report.index = record_step(&mut report.failures, "index_notes", indexed);

        let updated = self
            .batch_from_archive(&state, date)
            .map(|batch| apply_batch(&mut state, &batch, self.config.patterns.max_contexts));
        report.update = record_step(&mut report.failures, "update_patterns", updated);

        let score = self.score_state(&mut state);
        report.failures.extend(score.failures.iter().cloned());
        report.score = Some(score);

        let reinforced = self.reinforce_state(&mut state);
        report.reinforced = record_step(&mut report.failures, "reinforce_beliefs", reinforced)
            .unwrap_or(0);

        report.refreshed = habits::refresh_freshness(
            &mut state.notes,
            self.now(),
            self.config.habits.freshness_half_life_days,
        );

        self.repository.save(&state)?;
        tracing::info!(
            date = %report.date,
            patterns = state.patterns.len(),
            notes = state.notes.len(),
            failures = report.failures.len(),
            "Session end complete"
        );
        Ok(report)
    }

    // =========================================================================
    // Notes
    // =========================================================================

    /// Append `[HH:MM] text` notes to the date's archive
    pub fn record_session_notes(&self, date: NaiveDate, content: &str) -> Result<Option<PathBuf>> {
        self.archive.append_session_notes(date, content)
    }

    /// Index every archive into notes and rebuild clusters
    pub fn index_notes(&self) -> Result<IndexStats> {
        let mut state = self.repository.load()?;
        let documents = self.archive.documents()?;
        let stats = self.index_state(&mut state, &documents)?;
        self.repository.save(&state)?;
        Ok(stats)
    }

    fn index_state(&self, state: &mut MemoryState, documents: &[ArchiveDocument]) -> Result<IndexStats> {
        let bayesian = &self.config.confidence.bayesian;
        let prior = BayesianState::new(bayesian.prior_mean, bayesian.prior_variance)?;
        Ok(habits::index_notes(
            state,
            &self.tokenizer,
            documents,
            prior,
            self.config.habits.dedup_threshold,
            self.config.habits.cluster_threshold,
            self.now(),
        ))
    }

    /// Gated BM25 search over notes; `None` uses the configured gates
    pub fn search_habits(&self, query: &str, filters: Option<HabitFilters>) -> Result<Vec<HabitMatch>> {
        let state = self.repository.load()?;
        let filters = filters.unwrap_or_else(|| HabitFilters::from(&self.config.habits));
        Ok(habits::search_habits(
            &state.notes,
            query,
            &filters,
            &self.tokenizer,
            self.bm25,
            self.now(),
        ))
    }

    /// Record one use of a note
    pub fn apply_feedback(&self, note_id: &str, outcome: Outcome) -> Result<FeedbackResult> {
        let mut state = self.repository.load()?;
        let result = habits::apply_feedback(
            &mut state,
            note_id,
            outcome,
            self.now(),
            self.config.habits.freshness_half_life_days,
            self.config.confidence.bayesian.observation_variance,
        )?;
        self.repository.save(&state)?;
        Ok(result)
    }

    // =========================================================================
    // Patterns
    // =========================================================================

    /// Fold a batch of observations into the store
    pub fn update_patterns(&self, batch: &PatternBatch) -> Result<UpdateStats> {
        if parse_date(&batch.date).is_none() {
            return Err(Error::InvalidParameter(format!(
                "batch date must be YYYY-MM-DD, got '{}'",
                batch.date
            )));
        }
        let mut state = self.repository.load()?;
        let stats = apply_batch(&mut state, batch, self.config.patterns.max_contexts);
        self.repository.save(&state)?;
        Ok(stats)
    }

    /// Detect the date's patterns from its archive and fold them in
    pub fn update_from_archive(&mut self, date: NaiveDate) -> Result<UpdateStats> {
        let mut state = self.repository.load()?;
        let batch = self.batch_from_archive(&state, date)?;
        let stats = apply_batch(&mut state, &batch, self.config.patterns.max_contexts);
        self.repository.save(&state)?;
        Ok(stats)
    }

    /// Batch for one date: top patterns of that date's archive, contexts for
    /// the strongest patterns and co-occurrences over every archive
    pub fn batch_from_archive(&mut self, state: &MemoryState, date: NaiveDate) -> Result<PatternBatch> {
        let documents = self.archive.documents()?;
        let day = date.format(DATE_FORMAT).to_string();
        let limits = &self.config.patterns;

        let mut batch = PatternBatch::new(day.clone());
        let Some(today) = documents.iter().find(|d| d.date == day) else {
            tracing::debug!(date = %day, "No archive for session date");
            return Ok(batch);
        };

        batch.observations = self
            .tokenizer
            .detect_patterns(&today.content, limits.top_n)
            .into_iter()
            .collect();

        for pattern in context_candidates(state, &batch.observations, limits.context_top_n, &mut self.sampler) {
            let contexts = extract_contexts(&pattern, &documents);
            if !contexts.is_empty() {
                batch.contexts.insert(pattern, contexts);
            }
        }

        batch.cooccurrences = Some(detect_cooccurrences(
            &self.tokenizer,
            documents.iter().map(|d| d.content.as_str()),
            limits.cooccurrence_top_n,
        )?);
        Ok(batch)
    }

    /// Recompute every signal, the composite and the promotion candidates.
    ///
    /// Running it twice with the same store, archive and clock gives the same
    /// result. Beliefs are left alone.
    pub fn score_all(&self) -> Result<ScoreReport> {
        let mut state = self.repository.load()?;
        let report = self.score_state(&mut state);
        self.repository.save(&state)?;
        Ok(report)
    }

    fn score_state(&self, state: &mut MemoryState) -> ScoreReport {
        let config = &self.config;
        let now = self.now();
        let mut failures = Vec::new();
        let mut available = BTreeSet::new();

        let documents = match self.archive.documents() {
            Ok(documents) => documents,
            Err(e) => {
                failures.push(step_failure("archive", &e));
                Vec::new()
            }
        };
        let corpus: Corpus = documents
            .iter()
            .map(|d| self.tokenizer.tokenize(&self.tokenizer.strip_timestamps(&d.content)))
            .collect();

        if config.scoring.bm25.enabled {
            let scores = Bm25Params::new(config.scoring.bm25.k1, config.scoring.bm25.b).map(|params| {
                bm25::score_patterns(state.patterns.keys(), &corpus, &self.tokenizer, params)
            });
            apply_signal(state, Signal::Bm25, scores, &mut available, &mut failures);
        }

        if config.scoring.pmi.enabled {
            let min = config.scoring.pmi.min_cooccurrence;
            let total: u64 = documents
                .iter()
                .map(|d| self.tokenizer.extract_pattern_words(&d.content).len() as u64)
                .sum();
            let counts = state.pattern_counts();
            score_pairs(&mut state.cooccurrences, &counts, total);
            let scores = pattern_pmi_scores(state.patterns.keys(), &state.cooccurrences, min);
            let informative = total > 0 && state.cooccurrences.iter().any(|p| p.count >= min);
            if informative {
                apply_signal(state, Signal::Pmi, Ok(scores), &mut available, &mut failures);
            } else {
                for (text, score) in scores {
                    if let Some(record) = state.patterns.get_mut(&text) {
                        record.scores.set(Signal::Pmi, score);
                    }
                }
                tracing::debug!("No qualifying co-occurrence pairs, PMI left out of composite");
            }
        }

        if config.memory.ebbinghaus.enabled {
            let params = EbbinghausParams {
                base_strength: config.memory.ebbinghaus.base_strength,
                growth_factor: config.memory.ebbinghaus.growth_factor,
            };
            let scores = ebbinghaus_scores(&state.patterns, params, now);
            apply_signal(state, Signal::Ebbinghaus, scores, &mut available, &mut failures);
        }

        if config.scoring.time_decay.enabled {
            let scores = time_decay_scores(&state.patterns, config.scoring.time_decay.half_life_days, now);
            apply_signal(state, Signal::TimeDecay, scores, &mut available, &mut failures);
        }

        if config.diversity.shannon_entropy.enabled {
            let scores = entropy_scores(&state.patterns, &config.diversity.shannon_entropy);
            apply_signal(state, Signal::ShannonEntropy, scores, &mut available, &mut failures);
        }

        if config.scoring.tfidf.enabled {
            let scores = tfidf_scores(
                state.patterns.iter().map(|(text, r)| (text, r.count)),
                &corpus,
                &self.tokenizer,
            );
            if !scores.is_empty() {
                available.insert(Signal::Tfidf);
            }
            for (text, score) in scores {
                if let Some(record) = state.patterns.get_mut(&text) {
                    record.scores.tfidf_score = Some(score.tfidf);
                    record.scores.idf_score = Some(score.idf);
                }
            }
        }

        for (text, record) in state.patterns.iter_mut() {
            record.is_stopword = is_stopword(text);
        }

        let composite = CompositeScorer::new(&config.scoring.weights, config.promotion.stopword_penalty)
            .score(&state.patterns, &available);
        for (text, score) in composite {
            if let Some(record) = state.patterns.get_mut(&text) {
                record.composite_score = score;
            }
        }

        let mut schedules_started = 0;
        if config.memory.sm2.enabled {
            let today = now.date_naive();
            for record in state.patterns.values_mut().filter(|r| r.sm2_state.is_none()) {
                record.sm2_state = Some(Sm2Record::start(config.memory.sm2.initial_easiness, today));
                schedules_started += 1;
            }
        }

        let candidates = select_candidates(&state.patterns, &config.promotion);
        state.promotion_candidates = candidates.iter().map(|c| c.pattern.clone()).collect();

        let report = ScoreReport {
            scored: state.patterns.len(),
            signals: available.iter().map(|s| s.as_str().to_string()).collect(),
            candidates,
            schedules_started,
            failures,
        };
        tracing::info!(
            scored = report.scored,
            signals = report.signals.len(),
            candidates = report.candidates.len(),
            failures = report.failures.len(),
            "Scoring complete"
        );
        report
    }

    /// Feed each pattern's composite score into its beliefs
    pub fn reinforce_beliefs(&self) -> Result<usize> {
        let mut state = self.repository.load()?;
        let reinforced = self.reinforce_state(&mut state)?;
        self.repository.save(&state)?;
        Ok(reinforced)
    }

    fn reinforce_state(&self, state: &mut MemoryState) -> Result<usize> {
        let bayesian = &self.config.confidence.bayesian;
        let thompson = &self.config.confidence.thompson;
        if !bayesian.enabled && !thompson.enabled {
            return Ok(0);
        }
        let prior = BayesianState::new(bayesian.prior_mean, bayesian.prior_variance)?;
        let initial = ThompsonState::new(thompson.initial_alpha, thompson.initial_beta)?;

        let mut reinforced = 0;
        for (text, record) in state.patterns.iter_mut() {
            let evidence = record.composite_score;
            if bayesian.enabled {
                let current = record.bayesian_state.unwrap_or(prior);
                match current.update(evidence, bayesian.observation_variance) {
                    Ok(next) => record.bayesian_state = Some(next),
                    Err(e) => {
                        tracing::warn!("Failed to update belief for '{}': {}", text, e);
                        continue;
                    }
                }
            }
            if thompson.enabled {
                record.thompson_state = Some(record.thompson_state.unwrap_or(initial).update(evidence > 0.5));
            }
            reinforced += 1;
        }
        tracing::debug!(reinforced, "Reinforced pattern beliefs");
        Ok(reinforced)
    }

    /// Current promotion candidates with readiness, from stored scores
    pub fn promotion_candidates(&self) -> Result<Vec<PromotionCandidate>> {
        let state = self.repository.load()?;
        Ok(select_candidates(&state.patterns, &self.config.promotion))
    }

    /// Mark a pattern as promoted to a skill or an agent
    pub fn mark_promoted(&self, pattern: &str, kind: PromotionKind, path: Option<String>) -> Result<PromotionInfo> {
        let mut state = self.repository.load()?;
        let record = state
            .patterns
            .get_mut(pattern)
            .ok_or_else(|| Error::EntityNotFound(format!("Pattern '{}' not found", pattern)))?;

        let info = PromotionInfo {
            kind,
            path,
            promoted_at: format_timestamp(self.now()),
        };
        record.promoted = true;
        record.promotion = Some(info.clone());
        state.promotion_candidates.retain(|p| p != pattern);

        self.repository.save(&state)?;
        tracing::info!(pattern, kind = ?kind, "Marked pattern promoted");
        Ok(info)
    }

    // =========================================================================
    // Similarity and consolidation
    // =========================================================================

    /// Stored patterns within `max_distance` edits of `word`
    pub fn find_similar(&self, word: &str, max_distance: usize) -> Result<Vec<(String, usize)>> {
        let state = self.repository.load()?;
        let query = word.to_lowercase();
        let tree: BkTree = state.patterns.keys().map(|k| k.as_str()).collect();
        Ok(tree
            .search(&query, max_distance)
            .into_iter()
            .filter(|(candidate, _)| *candidate != query)
            .collect())
    }

    /// Similar pairs a consolidation would consider, without merging
    pub fn similar_pairs(&self, threshold: Option<usize>) -> Result<Vec<SimilarPatternPair>> {
        let threshold = self.distance_threshold(threshold)?;
        let state = self.repository.load()?;
        Ok(detect_similar_pairs(&state, threshold, self.config.similarity.min_count))
    }

    /// Merge near-duplicate patterns, backing the store up first.
    ///
    /// `None` uses the configured distance threshold.
    pub fn consolidate(&self, threshold: Option<usize>) -> Result<MergeReport> {
        let threshold = self.distance_threshold(threshold)?;
        let mut state = self.repository.load()?;
        let min_count = self.config.similarity.min_count;

        if detect_similar_pairs(&state, threshold, min_count).is_empty() {
            tracing::info!(threshold, "No similar patterns to consolidate");
            return Ok(MergeReport {
                final_pattern_count: state.patterns.len(),
                ..MergeReport::default()
            });
        }

        let backup = self.repository.backup()?;
        let mut report = consolidate::consolidate(
            &mut state,
            threshold,
            min_count,
            self.config.patterns.max_contexts,
        );
        report.backup = backup.map(|path| path.display().to_string());

        if report.merged_count > 0 {
            self.score_state(&mut state);
            self.repository.save(&state)?;
        }
        tracing::info!(
            merged = report.merged_count,
            remaining = report.final_pattern_count,
            "Consolidation complete"
        );
        Ok(report)
    }

    fn distance_threshold(&self, threshold: Option<usize>) -> Result<usize> {
        match threshold.unwrap_or(self.config.similarity.distance_threshold) {
            0 => Err(Error::InvalidParameter(
                "distance threshold must be at least 1".to_string(),
            )),
            k => Ok(k),
        }
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Patterns due for review on `today`, most overdue first
    pub fn due_reviews(&self, today: NaiveDate) -> Result<Vec<ReviewItem>> {
        let state = self.repository.load()?;
        let mut items: Vec<ReviewItem> = state
            .patterns
            .iter()
            .filter_map(|(text, record)| {
                let schedule = record.sm2_state.as_ref()?;
                let next = schedule.effective_next_review()?;
                is_due(next, today).then(|| ReviewItem {
                    pattern: text.clone(),
                    days_overdue: (today - next).num_days(),
                    next_review: next,
                    composite_score: record.composite_score,
                    state: schedule.state,
                })
            })
            .collect();
        sort_review_queue(&mut items);
        Ok(items)
    }

    /// Apply one SM-2 review graded 0-5 and stamp the review dates
    pub fn review_pattern(&self, pattern: &str, quality: u8) -> Result<ReviewOutcome> {
        let mut state = self.repository.load()?;
        let today = self.today();

        let record = state
            .patterns
            .get_mut(pattern)
            .ok_or_else(|| Error::EntityNotFound(format!("Pattern '{}' not found", pattern)))?;
        let schedule = record.sm2_state.as_mut().ok_or_else(|| {
            Error::EntityNotFound(format!("Pattern '{}' has no review schedule", pattern))
        })?;

        let next = schedule.state.review(quality)?;
        schedule.state = next;
        schedule.last_review = Some(today.format(DATE_FORMAT).to_string());
        schedule.next_review = Some(
            next_review_date(today, next.interval)
                .format(DATE_FORMAT)
                .to_string(),
        );
        let outcome = ReviewOutcome {
            pattern: pattern.to_string(),
            quality,
            schedule: schedule.clone(),
        };

        self.repository.save(&state)?;
        tracing::info!(
            pattern,
            quality,
            interval = next.interval,
            repetitions = next.repetitions,
            "Reviewed pattern"
        );
        Ok(outcome)
    }

    /// Review schedule counts relative to `today`
    pub fn review_summary(&self, today: NaiveDate) -> Result<ReviewSummary> {
        let state = self.repository.load()?;
        Ok(review_summary_of(&state, today))
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub fn stats(&self) -> Result<MemoryStats> {
        let state = self.repository.load()?;
        Ok(MemoryStats {
            patterns: state.patterns.len(),
            promoted: state.patterns.values().filter(|r| r.promoted).count(),
            promotion_candidates: state.promotion_candidates.len(),
            cooccurrences: state.cooccurrences.len(),
            notes: state.notes.len(),
            clusters: state.clusters.len(),
            archives: self.archive.count()?,
            reviews: review_summary_of(&state, self.today()),
        })
    }

    /// Replace the store with an empty one. A store recovered from a corrupt
    /// document refuses saves until this is called; the previous document is
    /// copied aside first.
    pub fn reset_store(&self) -> Result<Option<PathBuf>> {
        self.repository.reset()
    }
}

fn review_summary_of(state: &MemoryState, today: NaiveDate) -> ReviewSummary {
    ReviewSummary::from_schedules(
        state
            .patterns
            .values()
            .filter_map(|r| r.sm2_state.as_ref())
            .map(|s| (s.state, s.effective_next_review())),
        today,
    )
}

fn step_failure(step: &str, error: &Error) -> StepFailure {
    let failure = Error::PartialComputationFailure(format!("{}: {}", step, error));
    tracing::warn!("Step {} failed: {}", step, error);
    StepFailure {
        step: step.to_string(),
        error: failure.to_string(),
    }
}

fn record_step<T>(failures: &mut Vec<StepFailure>, step: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            failures.push(step_failure(step, &e));
            None
        }
    }
}

/// Store one signal's scores; an empty result leaves it out of the composite
fn apply_signal(
    state: &mut MemoryState,
    signal: Signal,
    scores: Result<BTreeMap<String, f64>>,
    available: &mut BTreeSet<Signal>,
    failures: &mut Vec<StepFailure>,
) {
    let scores = match scores {
        Ok(scores) => scores,
        Err(e) => {
            failures.push(step_failure(signal.as_str(), &e));
            return;
        }
    };
    if scores.is_empty() {
        tracing::debug!(signal = signal.as_str(), "Signal produced no scores");
        return;
    }
    for (text, score) in scores {
        if let Some(record) = state.patterns.get_mut(&text) {
            record.scores.set(signal, score);
        }
    }
    available.insert(signal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryRepository, PatternRecord};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn engine(dir: &TempDir, state: Option<MemoryState>) -> Engine<InMemoryRepository> {
        let repo = match state {
            Some(state) => InMemoryRepository::with_state(state),
            None => InMemoryRepository::new(),
        };
        EngineBuilder::new(PatmemConfig::default())
            .archive_dir(dir.path().join("archive"))
            .fixed_time(now())
            .seed(42)
            .build_with(repo)
            .unwrap()
    }

    fn patterns(entries: &[(&str, u64, &str)]) -> MemoryState {
        let mut state = MemoryState::default();
        for (text, count, day) in entries {
            state
                .patterns
                .insert(text.to_string(), PatternRecord::new(*count, day));
        }
        state
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = PatmemConfig::default();
        config.scoring.bm25.k1 = 5.0;
        let result = EngineBuilder::new(config).build_with(InMemoryRepository::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_consolidate_end_to_end() {
        let dir = TempDir::new().unwrap();
        let mut state = patterns(&[
            ("test", 5, "2025-01-01"),
            ("tests", 3, "2025-01-02"),
            ("testing", 2, "2025-01-03"),
        ]);
        state.promotion_candidates = vec!["tests".to_string()];
        let engine = engine(&dir, Some(state));

        let pairs = engine.similar_pairs(Some(2)).unwrap();
        assert_eq!(pairs[0].patterns, ["test".to_string(), "tests".to_string()]);
        assert_eq!(pairs[0].distance, 1);
        assert_eq!(pairs[0].keep, "test");

        let report = engine.consolidate(Some(2)).unwrap();
        assert_eq!(report.merged_count, 1);
        assert_eq!(report.final_pattern_count, 2);
        assert!(report.backup.is_none());

        let saved = engine.repository().snapshot().unwrap();
        let keys: Vec<&str> = saved.patterns.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["test", "testing"]);
        assert_eq!(saved.patterns["test"].count, 8);
        assert_eq!(saved.patterns["test"].sessions.len(), 2);
        assert!(!saved.promotion_candidates.contains(&"tests".to_string()));
    }

    #[test]
    fn test_consolidate_rejects_zero_threshold() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, Some(patterns(&[("test", 5, "2025-01-01")])));
        assert!(matches!(
            engine.consolidate(Some(0)),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_consolidate_backs_up_json_store() {
        let dir = TempDir::new().unwrap();
        let mut config = PatmemConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let engine = EngineBuilder::new(config).fixed_time(now()).build().unwrap();
        engine
            .repository()
            .save(&patterns(&[("test", 5, "2025-01-01"), ("tests", 3, "2025-01-02")]))
            .unwrap();

        let report = engine.consolidate(None).unwrap();
        assert_eq!(report.merged_count, 1);
        let backup = PathBuf::from(report.backup.unwrap());
        assert!(backup.is_file());
        assert_eq!(engine.repository().list_backups().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_json_store_survives_scoring() {
        let dir = TempDir::new().unwrap();
        let mut config = PatmemConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let engine = EngineBuilder::new(config).fixed_time(now()).build().unwrap();
        let path = engine.repository().path().to_path_buf();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ \"patterns\": oops").unwrap();

        assert!(matches!(engine.score_all(), Err(Error::CorruptStore(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ \"patterns\": oops");
        assert_eq!(engine.stats().unwrap().patterns, 0);

        let preserved = engine.reset_store().unwrap().unwrap();
        assert_eq!(
            std::fs::read_to_string(preserved).unwrap(),
            "{ \"patterns\": oops"
        );
        assert_eq!(engine.score_all().unwrap().scored, 0);
    }

    #[test]
    fn test_score_all_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let engine = engine(
            &dir,
            Some(patterns(&[
                ("deploy", 6, "2025-01-09"),
                ("tests", 3, "2025-01-01"),
                ("the", 9, "2025-01-09"),
            ])),
        );
        engine
            .record_session_notes(date("2025-01-09"), "[09:00] deploy the tests\n[10:00] deploy again")
            .unwrap();

        let first = engine.score_all().unwrap();
        let after_first = engine.repository().snapshot().unwrap();
        let second = engine.score_all().unwrap();
        let after_second = engine.repository().snapshot().unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(first.candidates, second.candidates);
        assert_eq!(first.schedules_started, 3);
        assert_eq!(second.schedules_started, 0);
        assert!(first.failures.is_empty());
        assert!(first.signals.contains(&"bm25".to_string()));
        assert!(first.signals.contains(&"ebbinghaus".to_string()));

        for record in after_first.patterns.values() {
            assert!((0.0..=1.0).contains(&record.composite_score));
            assert!(record.bayesian_state.is_none());
        }
        assert!(after_first.patterns["the"].is_stopword);
        assert!(
            after_first.patterns["deploy"].composite_score
                > after_first.patterns["tests"].composite_score
        );
    }

    #[test]
    fn test_failing_signal_is_reported_and_others_proceed() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, Some(patterns(&[("deploy", 4, "2025-01-09")])));
        engine.config.scoring.time_decay.half_life_days = 0.0;

        let report = engine.score_all().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, "time_decay");
        assert!(report.failures[0]
            .error
            .starts_with("Partial computation failure"));

        let saved = engine.repository().snapshot().unwrap();
        let record = &saved.patterns["deploy"];
        assert!(record.scores.ebbinghaus_score.is_some());
        assert!(record.scores.time_decay_score.is_none());
        assert!(record.sm2_state.is_some());
    }

    #[test]
    fn test_session_end_pipeline() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, None);

        let notes = "[09:00] Run tests before commit\n[09:30] Deploy after tests pass\n[10:00] Check documentation";
        let report = engine
            .ingest(LifecycleEvent::SessionNotes {
                date: date("2025-01-10"),
                content: notes.to_string(),
            })
            .unwrap();
        assert!(matches!(report, IngestReport::SessionNotes { path: Some(_) }));

        let report = engine
            .ingest(LifecycleEvent::SessionEnd { date: date("2025-01-10") })
            .unwrap();
        let IngestReport::SessionEnd(session) = report else {
            panic!("expected a session report");
        };
        assert!(session.failures.is_empty());
        assert_eq!(session.index.as_ref().unwrap().new_notes, 3);
        let update = session.update.as_ref().unwrap();
        assert!(update.new_patterns > 0);
        assert!(update.cooccurrences > 0);
        assert_eq!(session.reinforced, update.total_patterns);

        let saved = engine.repository().snapshot().unwrap();
        let tests = &saved.patterns["tests"];
        assert_eq!(tests.count, 2);
        assert!(!tests.contexts().is_empty());
        assert!(tests.contexts().len() <= engine.config().patterns.max_contexts);
        assert!(tests.bayesian_state.is_some());
        assert!(tests.thompson_state.is_some());
        assert!(tests.sm2_state.is_some());
        assert_eq!(saved.notes.len(), 3);
    }

    #[test]
    fn test_session_end_without_archive_still_saves() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir, Some(patterns(&[("deploy", 4, "2025-01-09")])));
        let report = engine.session_end(date("2025-01-10")).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.update.unwrap().new_patterns, 0);
        assert_eq!(report.reinforced, 1);
        assert!(engine.repository().snapshot().unwrap().patterns["deploy"]
            .bayesian_state
            .is_some());
    }

    #[test]
    fn test_habit_search_and_feedback() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, None);
        engine
            .record_session_notes(
                date("2025-01-09"),
                "[09:00] Run tests before commit\n[10:00] Check documentation",
            )
            .unwrap();
        let stats = engine.index_notes().unwrap();
        assert_eq!(stats.new_notes, 2);

        let filters = HabitFilters {
            min_confidence: 0.5,
            ..HabitFilters::default()
        };
        let results = engine.search_habits("run tests", Some(filters)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "Run tests before commit");

        let id = results[0].note_id.clone();
        let feedback = engine.apply_feedback(&id, Outcome::Success).unwrap();
        assert!(feedback.confidence.mean > 0.5);
        assert_eq!(feedback.use_count, 1);

        let err = engine.apply_feedback("n_missing", Outcome::Failure).unwrap_err();
        assert!(matches!(err, Error::EntityNotFound(_)));
    }

    #[test]
    fn test_review_workflow() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, Some(patterns(&[("deploy", 4, "2025-01-09"), ("tests", 2, "2025-01-09")])));
        engine.score_all().unwrap();

        // Fresh schedules fall due one day after they start
        assert!(engine.due_reviews(engine.today()).unwrap().is_empty());
        let due = engine.due_reviews(date("2025-01-11")).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].days_overdue, 0);

        let outcome = engine.review_pattern("deploy", 4).unwrap();
        assert_eq!(outcome.schedule.state.repetitions, 1);
        assert_eq!(outcome.schedule.next_review.as_deref(), Some("2025-01-11"));

        assert!(matches!(
            engine.review_pattern("deploy", 7),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            engine.review_pattern("missing", 4),
            Err(Error::EntityNotFound(_))
        ));

        let summary = engine.review_summary(date("2025-01-12")).unwrap();
        assert_eq!(summary.total_tracked, 2);
        assert_eq!(summary.overdue, 2);
    }

    #[test]
    fn test_review_without_schedule() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, Some(patterns(&[("deploy", 4, "2025-01-09")])));
        let err = engine.review_pattern("deploy", 4).unwrap_err();
        assert!(err.to_string().contains("no review schedule"));
    }

    #[test]
    fn test_mark_promoted_and_stats() {
        let dir = TempDir::new().unwrap();
        let mut state = patterns(&[("deploy", 4, "2025-01-09"), ("tests", 2, "2025-01-09")]);
        state.promotion_candidates = vec!["deploy".to_string()];
        let engine = engine(&dir, Some(state));

        let info = engine
            .mark_promoted("deploy", PromotionKind::Skill, Some("skills/deploy.md".to_string()))
            .unwrap();
        assert_eq!(info.promoted_at, "2025-01-10T12:00:00Z");
        assert!(matches!(
            engine.mark_promoted("missing", PromotionKind::Agent, None),
            Err(Error::EntityNotFound(_))
        ));

        let stats = engine.stats().unwrap();
        assert_eq!(stats.patterns, 2);
        assert_eq!(stats.promoted, 1);
        assert_eq!(stats.promotion_candidates, 0);
        assert_eq!(stats.archives, 0);
    }

    #[test]
    fn test_find_similar_excludes_query() {
        let dir = TempDir::new().unwrap();
        let engine = engine(
            &dir,
            Some(patterns(&[
                ("test", 5, "2025-01-01"),
                ("tests", 3, "2025-01-01"),
                ("deploy", 1, "2025-01-01"),
            ])),
        );
        let similar = engine.find_similar("test", 1).unwrap();
        assert_eq!(similar, vec![("tests".to_string(), 1)]);
    }

    #[test]
    fn test_update_patterns_validates_date() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, None);
        let err = engine
            .update_patterns(&PatternBatch::new("yesterday").observe("x", 1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));

        let stats = engine
            .update_patterns(&PatternBatch::new("2025-01-10").observe("deploy", 2))
            .unwrap();
        assert_eq!(stats.new_patterns, 1);
    }
}
