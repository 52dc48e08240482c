//! Habit notes: indexing from archives, gated search, usage feedback

pub mod feedback;
pub mod indexer;
pub mod search;

pub use feedback::{apply_feedback, note_freshness, refresh_freshness, FeedbackResult};
pub use indexer::{index_notes, IndexStats};
pub use search::{search_habits, HabitFilters, HabitMatch};
