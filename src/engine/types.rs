//! Lifecycle events and operation reports

use crate::consolidate::MergeReport;
use crate::habits::{FeedbackResult, IndexStats};
use crate::memory::{Outcome, ReviewSummary};
use crate::scoring::PromotionCandidate;
use crate::store::Sm2Record;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Events
// =============================================================================

/// Host lifecycle trigger handed to [`Engine::ingest`](super::Engine::ingest)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Raw `[HH:MM] text` notes from a session, archived under `date`
    SessionNotes { date: NaiveDate, content: String },
    /// A session closed: index, update, score, reinforce, refresh
    SessionEnd { date: NaiveDate },
    /// Merge near-duplicate patterns
    Consolidate {
        #[serde(default)]
        threshold: Option<usize>,
    },
    /// A habit note was used with the given outcome
    Feedback { note_id: String, outcome: Outcome },
    /// A pattern was reviewed with an SM-2 quality grade
    Review { pattern: String, quality: u8 },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::SessionNotes { .. } => "session_notes",
            LifecycleEvent::SessionEnd { .. } => "session_end",
            LifecycleEvent::Consolidate { .. } => "consolidate",
            LifecycleEvent::Feedback { .. } => "feedback",
            LifecycleEvent::Review { .. } => "review",
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// A pipeline step that failed while the rest carried on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

/// Counts from folding one batch of observations into the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateStats {
    pub date: String,
    pub new_patterns: usize,
    pub updated_patterns: usize,
    pub total_patterns: usize,
    pub contexts_updated: usize,
    pub cooccurrences: usize,
}

/// Result of one scoring pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreReport {
    pub scored: usize,
    /// Signals that produced scores and fed the composite
    pub signals: Vec<String>,
    pub candidates: Vec<PromotionCandidate>,
    pub schedules_started: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StepFailure>,
}

/// Everything a session end did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionReport {
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreReport>,
    pub reinforced: usize,
    pub refreshed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StepFailure>,
}

/// Schedule of a pattern after a review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewOutcome {
    pub pattern: String,
    pub quality: u8,
    pub schedule: Sm2Record,
}

/// Result of one ingested event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IngestReport {
    SessionNotes { path: Option<PathBuf> },
    SessionEnd(SessionReport),
    Consolidate(MergeReport),
    Feedback(FeedbackResult),
    Review(ReviewOutcome),
}

/// Store-wide counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    pub patterns: usize,
    pub promoted: usize,
    pub promotion_candidates: usize,
    pub cooccurrences: usize,
    pub notes: usize,
    pub clusters: usize,
    pub archives: usize,
    pub reviews: ReviewSummary,
}
