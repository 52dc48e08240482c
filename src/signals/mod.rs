//! Per-pattern signals derived from a pattern's own history
//!
//! Each calculator maps the pattern table to a score per pattern and is
//! independent of the others, so one failing does not block the rest.

pub mod ebbinghaus;
pub mod entropy;
pub mod time_decay;

pub use ebbinghaus::{ebbinghaus_scores, EbbinghausParams};
pub use entropy::entropy_scores;
pub use time_decay::time_decay_scores;
