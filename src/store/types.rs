//! Typed records of the persisted store
//!
//! Dates stay as strings on disk so that one malformed value makes only its
//! own entity unusable; parsing happens at the point of use through
//! [`parse_date`] and [`parse_timestamp`].

use crate::config::Signal;
use crate::error::{Error, Result};
use crate::memory::{BayesianState, Sm2State, ThompsonState};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Calendar date format used for session dates and review dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fallback last-seen date for merges where neither side has one
const EPOCH_DATE: &str = "1900-01-01";

/// Parse a `YYYY-MM-DD` date, or the date part of an RFC 3339 timestamp
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .or_else(|| parse_timestamp(value).map(|ts| ts.date_naive()))
}

/// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC)
/// or a bare date (taken as midnight UTC)
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Fractional days from `value` to `now`, or `None` when unparsable
pub fn days_since(value: &str, now: DateTime<Utc>) -> Option<f64> {
    parse_timestamp(value).map(|ts| (now - ts).num_seconds() as f64 / 86_400.0)
}

/// Format a timestamp the way notes and clusters persist it
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Round to six decimal places
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

// =============================================================================
// Patterns
// =============================================================================

/// Per-signal raw scores of a pattern, as last computed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm25_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmi_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebbinghaus_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_decay_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shannon_entropy_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tfidf_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idf_score: Option<f64>,
}

impl SignalScores {
    /// Score stored for a signal
    pub fn get(&self, signal: Signal) -> Option<f64> {
        match signal {
            Signal::Bm25 => self.bm25_score,
            Signal::Pmi => self.pmi_score,
            Signal::Ebbinghaus => self.ebbinghaus_score,
            Signal::TimeDecay => self.time_decay_score,
            Signal::ShannonEntropy => self.shannon_entropy_score,
            Signal::Tfidf => self.tfidf_score,
        }
    }

    /// Overwrite the score of a signal
    pub fn set(&mut self, signal: Signal, value: f64) {
        let slot = match signal {
            Signal::Bm25 => &mut self.bm25_score,
            Signal::Pmi => &mut self.pmi_score,
            Signal::Ebbinghaus => &mut self.ebbinghaus_score,
            Signal::TimeDecay => &mut self.time_decay_score,
            Signal::ShannonEntropy => &mut self.shannon_entropy_score,
            Signal::Tfidf => &mut self.tfidf_score,
        };
        *slot = Some(value);
    }
}

/// Where a promoted pattern was elevated to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// Reusable skill
    Skill,
    /// Dedicated agent
    Agent,
}

impl std::str::FromStr for PromotionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skill" => Ok(PromotionKind::Skill),
            "agent" => Ok(PromotionKind::Agent),
            other => Err(Error::InvalidParameter(format!(
                "promotion type must be 'skill' or 'agent', got '{}'",
                other
            ))),
        }
    }
}

/// Promotion metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionInfo {
    /// Promotion target type
    pub kind: PromotionKind,
    /// Location of the promoted artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// When the promotion happened
    pub promoted_at: String,
}

/// Spaced-repetition schedule attached to a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sm2Record {
    /// Scheduler state
    #[serde(flatten)]
    pub state: Sm2State,
    /// Date of the last review
    #[serde(default)]
    pub last_review: Option<String>,
    /// Date the next review falls due
    #[serde(default)]
    pub next_review: Option<String>,
}

impl Sm2Record {
    /// Fresh schedule starting today
    pub fn start(initial_easiness: f64, today: NaiveDate) -> Self {
        Self {
            state: Sm2State::new(initial_easiness),
            last_review: Some(today.format(DATE_FORMAT).to_string()),
            next_review: None,
        }
    }

    /// Next review date: explicit if recorded, else last review plus interval
    pub fn effective_next_review(&self) -> Option<NaiveDate> {
        if let Some(next) = self.next_review.as_deref().and_then(parse_date) {
            return Some(next);
        }
        self.last_review
            .as_deref()
            .and_then(parse_date)
            .map(|last| crate::memory::sm2::next_review_date(last, self.state.interval))
    }
}

/// A recurring pattern, keyed in the store by its text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    /// Occurrences summed over all sessions
    pub count: u64,
    /// First session date the pattern was seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    /// Most recent session date the pattern was seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
    /// Session identifiers (unique, sorted)
    #[serde(default)]
    pub sessions: BTreeSet<String>,
    /// Example context lines, most recent last
    #[serde(default)]
    contexts: Vec<String>,
    /// Raw per-signal scores
    #[serde(flatten)]
    pub scores: SignalScores,
    /// Weighted composite in [0, 1]
    #[serde(default)]
    pub composite_score: f64,
    /// Whether the pattern text is a stopword
    #[serde(default)]
    pub is_stopword: bool,
    /// Whether the pattern has been promoted
    #[serde(default)]
    pub promoted: bool,
    /// Promotion metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionInfo>,
    /// Spaced-repetition schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm2_state: Option<Sm2Record>,
    /// Gaussian confidence belief
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bayesian_state: Option<BayesianState>,
    /// Beta exploration belief
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thompson_state: Option<ThompsonState>,
}

impl PatternRecord {
    /// New record observed `count` times in the session `date`
    pub fn new(count: u64, date: &str) -> Self {
        let mut sessions = BTreeSet::new();
        sessions.insert(date.to_string());
        Self {
            count,
            first_seen: Some(date.to_string()),
            last_seen: Some(date.to_string()),
            sessions,
            ..Self::default()
        }
    }

    /// Add `count` occurrences from session `date`
    pub fn observe(&mut self, count: u64, date: &str) {
        self.count += count;
        self.sessions.insert(date.to_string());
        if self.first_seen.is_none() {
            self.first_seen = Some(date.to_string());
        }
        self.last_seen = Some(date.to_string());
    }

    /// Example contexts, oldest first
    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    /// Append a context, keeping at most `cap` of the most recent entries.
    /// Duplicates move to the most recent position.
    pub fn push_context(&mut self, context: impl Into<String>, cap: usize) {
        let context = context.into();
        self.contexts.retain(|c| c != &context);
        self.contexts.push(context);
        self.truncate_contexts(cap);
    }

    /// Replace contexts, deduplicated in order, keeping the `cap` most recent
    pub fn set_contexts<I, S>(&mut self, contexts: I, cap: usize)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        self.contexts = contexts
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| seen.insert(c.clone()))
            .collect();
        self.truncate_contexts(cap);
    }

    fn truncate_contexts(&mut self, cap: usize) {
        if self.contexts.len() > cap {
            let excess = self.contexts.len() - cap;
            self.contexts.drain(..excess);
        }
    }

    /// Fold `other` into `self`: counts add, sessions and contexts union,
    /// the later last-seen and the earlier first-seen win.
    pub fn absorb(&mut self, other: &PatternRecord, context_cap: usize) {
        self.count += other.count;
        self.sessions.extend(other.sessions.iter().cloned());

        let merged: Vec<String> = self
            .contexts
            .iter()
            .chain(other.contexts.iter())
            .cloned()
            .collect();
        self.set_contexts(merged, context_cap);

        self.last_seen = later_date(self.last_seen.as_deref(), other.last_seen.as_deref());
        self.first_seen = match (self.first_seen.as_deref(), other.first_seen.as_deref()) {
            (Some(a), Some(b)) => Some(if b < a { b } else { a }.to_string()),
            (a, b) => a.or(b).map(str::to_string),
        };
    }

    /// Parsed last-seen date
    pub fn last_seen_date(&self) -> Option<NaiveDate> {
        self.last_seen.as_deref().and_then(parse_date)
    }
}

/// The later of two optional dates, compared as `YYYY-MM-DD` strings
fn later_date(a: Option<&str>, b: Option<&str>) -> Option<String> {
    let a = a.unwrap_or(EPOCH_DATE);
    let b = b.unwrap_or(EPOCH_DATE);
    let later = if b > a { b } else { a };
    if later == EPOCH_DATE {
        None
    } else {
        Some(later.to_string())
    }
}

/// Unordered pair of distinct pattern texts that share archive lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooccurrencePair {
    words: [String; 2],
    /// Lines both words appear on
    pub count: u64,
    /// Raw PMI of the pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmi_score: Option<f64>,
}

impl CooccurrencePair {
    /// Create a pair; members are stored sorted and must differ
    pub fn new(a: impl Into<String>, b: impl Into<String>, count: u64) -> Result<Self> {
        let a = a.into();
        let b = b.into();
        if a == b {
            return Err(Error::InvalidParameter(format!(
                "co-occurrence pair needs two distinct words, got '{}' twice",
                a
            )));
        }
        let words = if a < b { [a, b] } else { [b, a] };
        Ok(Self {
            words,
            count,
            pmi_score: None,
        })
    }

    /// The two members, sorted
    pub fn words(&self) -> (&str, &str) {
        (&self.words[0], &self.words[1])
    }

    /// Whether `word` is a member
    pub fn contains(&self, word: &str) -> bool {
        self.words[0] == word || self.words[1] == word
    }

    /// Whether the pair has two distinct members (loaded pairs may not)
    pub fn is_valid(&self) -> bool {
        self.words[0] != self.words[1]
    }
}

// =============================================================================
// Notes and clusters
// =============================================================================

/// A short habit note extracted from an archive line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// `n_{YYYYMMDD}_{seq}`
    pub id: String,
    /// Note text without the time stamp
    pub text: String,
    /// Archive date the note came from
    pub session_date: String,
    /// Archive date plus parsed time
    pub timestamp: String,
    /// Archive file name
    pub source_archive: String,
    /// Cluster the note belongs to
    #[serde(default)]
    pub cluster_id: Option<String>,
    /// Gaussian belief that the habit is useful
    #[serde(default)]
    pub confidence: BayesianState,
    /// Times the note was applied
    #[serde(default)]
    pub use_count: u32,
    /// Successful applications
    #[serde(default)]
    pub success_count: u32,
    /// Failed applications
    #[serde(default)]
    pub failure_count: u32,
    /// When the note was last applied
    #[serde(default)]
    pub last_used: Option<String>,
    /// Recency of use in [0, 1]
    #[serde(default = "neutral_freshness")]
    pub freshness: f64,
}

fn neutral_freshness() -> f64 {
    0.5
}

impl Note {
    /// Sequence number parsed from the id suffix
    pub fn sequence(&self) -> Option<u32> {
        self.id.rsplit('_').next().and_then(|s| s.parse().ok())
    }
}

/// Group of similar notes, rebuilt on every indexing pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Optional human label
    #[serde(default)]
    pub label: Option<String>,
    /// Member note ids; the first is the representative
    pub note_ids: Vec<String>,
    /// Mean of member confidence means
    pub confidence: f64,
    /// When the cluster was built
    pub created_at: String,
}

// =============================================================================
// Store document
// =============================================================================

/// The whole persisted store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    /// Pattern text to record
    #[serde(default)]
    pub patterns: BTreeMap<String, PatternRecord>,
    /// Co-occurrence pairs from the archive
    #[serde(default)]
    pub cooccurrences: Vec<CooccurrencePair>,
    /// Pattern texts eligible for promotion, best first
    #[serde(default)]
    pub promotion_candidates: Vec<String>,
    /// Habit notes
    #[serde(default)]
    pub notes: Vec<Note>,
    /// Cluster id to cluster
    #[serde(default)]
    pub clusters: BTreeMap<String, Cluster>,
}

impl MemoryState {
    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.notes.is_empty()
    }

    /// Look up a note by id
    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Look up a note by id, mutably
    pub fn note_mut(&mut self, id: &str) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    /// Pattern text to occurrence count
    pub fn pattern_counts(&self) -> BTreeMap<String, u64> {
        self.patterns
            .iter()
            .map(|(text, record)| (text.clone(), record.count))
            .collect()
    }
}
