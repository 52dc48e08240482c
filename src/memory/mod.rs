//! Per-entity memory state managers
//!
//! - [`sm2`]: spaced-repetition review scheduling
//! - [`bayesian`]: Gaussian confidence belief with precision-weighted updates
//! - [`thompson`]: Beta exploration belief sampled through an injected RNG
//!
//! Each state is a small `Copy` value; transitions return a new value and
//! never mutate in place.

pub mod bayesian;
pub mod sm2;
pub mod thompson;

pub use bayesian::{BayesianState, Outcome};
pub use sm2::{ReviewItem, ReviewSummary, Sm2State};
pub use thompson::{ThompsonSampler, ThompsonState};
