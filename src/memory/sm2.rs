//! SM-2 spaced-repetition scheduler
//!
//! State machine over `(easiness, interval, repetitions)` driven by a recall
//! quality in `0..=5` (3 is the pass mark):
//!
//! ```text
//! easiness' = max(1.3, easiness + 0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
//! q < 3     => repetitions' = 0, interval' = 1
//! q >= 3    => repetitions' = repetitions + 1
//!              interval' = 1 | 6 | floor(interval * easiness')
//!                          for repetitions = 0 | 1 | more (before the update)
//! ```

use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Lowest easiness factor the scheduler allows
pub const MIN_EASINESS: f64 = 1.3;

/// Highest recall quality
pub const MAX_QUALITY: u8 = 5;

/// Lowest quality that counts as a successful recall
pub const PASS_QUALITY: u8 = 3;

/// Absorbs float error so 6 * 2.5 floors to 15, not 14
const FLOOR_EPSILON: f64 = 1e-9;

/// Days ahead that count as "due soon" in a summary
const DUE_SOON_DAYS: i64 = 7;

/// Scheduler state for one pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sm2State {
    /// Easiness factor (>= 1.3)
    pub easiness_factor: f64,
    /// Days until the next review (>= 1)
    pub interval: u32,
    /// Consecutive successful reviews
    pub repetitions: u32,
}

impl Default for Sm2State {
    fn default() -> Self {
        Self::new(2.5)
    }
}

impl Sm2State {
    /// Fresh state with the given starting easiness
    #[must_use]
    pub fn new(initial_easiness: f64) -> Self {
        Self {
            easiness_factor: initial_easiness.max(MIN_EASINESS),
            interval: 1,
            repetitions: 0,
        }
    }

    /// Apply one review of the given quality
    pub fn review(&self, quality: u8) -> Result<Self> {
        if quality > MAX_QUALITY {
            return Err(Error::InvalidParameter(format!(
                "quality must be 0-{}, got {}",
                MAX_QUALITY, quality
            )));
        }

        let easiness_factor = update_easiness(self.easiness_factor, quality);

        if quality < PASS_QUALITY {
            return Ok(Self {
                easiness_factor,
                interval: 1,
                repetitions: 0,
            });
        }

        let interval = match self.repetitions {
            0 => 1,
            1 => 6,
            _ => {
                let next = (f64::from(self.interval) * easiness_factor + FLOOR_EPSILON).floor();
                if next >= f64::from(u32::MAX) {
                    u32::MAX
                } else {
                    (next as u32).max(1)
                }
            }
        };

        Ok(Self {
            easiness_factor,
            interval,
            repetitions: self.repetitions + 1,
        })
    }
}

/// Easiness after a review of quality `q`, floored at [`MIN_EASINESS`]
#[must_use]
pub fn update_easiness(easiness: f64, quality: u8) -> f64 {
    let miss = f64::from(MAX_QUALITY.saturating_sub(quality));
    (easiness + 0.1 - miss * (0.08 + miss * 0.02)).max(MIN_EASINESS)
}

/// Date the next review falls due
#[must_use]
pub fn next_review_date(last_review: NaiveDate, interval: u32) -> NaiveDate {
    last_review + Duration::days(i64::from(interval))
}

/// A review is due once the current date reaches the next-review date
#[must_use]
pub fn is_due(next_review: NaiveDate, today: NaiveDate) -> bool {
    today >= next_review
}

/// One entry of the review queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    /// Pattern text
    pub pattern: String,
    /// Days past the due date (0 = due today)
    pub days_overdue: i64,
    /// Date the review fell due
    pub next_review: NaiveDate,
    /// Composite score used to break ties
    pub composite_score: f64,
    /// Current scheduler state
    pub state: Sm2State,
}

/// Sort a review queue: most overdue first, ties by composite descending
pub fn sort_review_queue(items: &mut [ReviewItem]) {
    items.sort_by(|a, b| {
        b.days_overdue
            .cmp(&a.days_overdue)
            .then_with(|| {
                b.composite_score
                    .partial_cmp(&a.composite_score)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
}

/// Counts of scheduled reviews relative to a date
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewSummary {
    /// Patterns carrying a schedule
    pub total_tracked: usize,
    /// Due before today
    pub overdue: usize,
    /// Due today
    pub due_today: usize,
    /// Due within the next week
    pub due_soon: usize,
    /// Due later than a week from now
    pub not_due: usize,
    /// Mean easiness over tracked patterns
    pub avg_easiness: f64,
    /// Longest interval in days
    pub max_interval: u32,
}

impl ReviewSummary {
    /// Summarize schedules given as `(state, next review date)` pairs.
    /// Schedules without a usable date count as tracked but are not bucketed.
    pub fn from_schedules<I>(schedules: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = (Sm2State, Option<NaiveDate>)>,
    {
        let mut summary = Self::default();
        let mut easiness_sum = 0.0;

        for (state, next) in schedules {
            summary.total_tracked += 1;
            easiness_sum += state.easiness_factor;
            summary.max_interval = summary.max_interval.max(state.interval);

            let Some(next) = next else { continue };
            let ahead = (next - today).num_days();
            if ahead < 0 {
                summary.overdue += 1;
            } else if ahead == 0 {
                summary.due_today += 1;
            } else if ahead <= DUE_SOON_DAYS {
                summary.due_soon += 1;
            } else {
                summary.not_due += 1;
            }
        }

        if summary.total_tracked > 0 {
            summary.avg_easiness = easiness_sum / summary.total_tracked as f64;
        }
        summary
    }
}
