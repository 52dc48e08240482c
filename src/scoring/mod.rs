//! Composite ranking and promotion selection

pub mod composite;
pub mod promotion;

pub use composite::{normalize_min_max, CompositeScorer};
pub use promotion::{select_candidates, PromotionCandidate};
