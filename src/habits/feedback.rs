//! Habit usage feedback and freshness

use crate::error::{Error, Result};
use crate::memory::{BayesianState, Outcome};
use crate::store::types::{days_since, format_timestamp, MemoryState, Note};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Freshness of a note that has never been used
pub const NEVER_USED_FRESHNESS: f64 = 0.5;

/// `2^(-days / half_life)` since last use, clamped to [0, 1].
///
/// Never-used notes and unparsable timestamps get [`NEVER_USED_FRESHNESS`].
pub fn note_freshness(last_used: Option<&str>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let Some(days) = last_used.and_then(|ts| days_since(ts, now)) else {
        return NEVER_USED_FRESHNESS;
    };
    if !(half_life_days > 0.0) {
        return NEVER_USED_FRESHNESS;
    }
    2f64.powf(-days.max(0.0) / half_life_days).clamp(0.0, 1.0)
}

/// Updated state of a note after feedback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackResult {
    pub note_id: String,
    pub outcome: Outcome,
    pub confidence: BayesianState,
    pub use_count: u32,
    pub success_count: u32,
    pub failure_count: u32,
}

/// Record one use of a note and fold the outcome into its confidence.
///
/// An unknown note id fails with `EntityNotFound` and changes nothing.
pub fn apply_feedback(
    state: &mut MemoryState,
    note_id: &str,
    outcome: Outcome,
    now: DateTime<Utc>,
    half_life_days: f64,
    observation_variance: f64,
) -> Result<FeedbackResult> {
    let note = state
        .note_mut(note_id)
        .ok_or_else(|| Error::EntityNotFound(format!("Note '{}' not found", note_id)))?;

    let confidence = note.confidence.observe(outcome, observation_variance)?;

    note.confidence = confidence;
    note.use_count += 1;
    match outcome {
        Outcome::Success => note.success_count += 1,
        Outcome::Failure => note.failure_count += 1,
        Outcome::Partial => {}
    }
    let used_at = format_timestamp(now);
    note.freshness = note_freshness(Some(&used_at), now, half_life_days);
    note.last_used = Some(used_at);

    tracing::info!(
        note_id,
        outcome = %outcome,
        mean = confidence.mean,
        variance = confidence.variance,
        "Applied habit feedback"
    );

    Ok(FeedbackResult {
        note_id: note_id.to_string(),
        outcome,
        confidence,
        use_count: note.use_count,
        success_count: note.success_count,
        failure_count: note.failure_count,
    })
}

/// Recompute every note's stored freshness; returns how many changed
pub fn refresh_freshness(notes: &mut [Note], now: DateTime<Utc>, half_life_days: f64) -> usize {
    let mut changed = 0;
    for note in notes.iter_mut() {
        let fresh = note_freshness(note.last_used.as_deref(), now, half_life_days);
        if (fresh - note.freshness).abs() > f64::EPSILON {
            note.freshness = fresh;
            changed += 1;
        }
    }
    changed
}
