//! Approximate string matching
//!
//! Levenshtein edit distance plus a BK-tree that answers "every indexed word
//! within distance k" without scanning the whole vocabulary. The tree is
//! transient: it is rebuilt from the live pattern set for each batch.

pub mod bktree;
pub mod levenshtein;

pub use bktree::{BkTree, SimilarPair};
pub use levenshtein::{levenshtein_distance, similarity_ratio};
