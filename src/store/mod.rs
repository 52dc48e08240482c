//! Persisted store
//!
//! One JSON document holds every pattern, co-occurrence pair, note and
//! cluster. Components mutate an in-memory [`MemoryState`]; the
//! [`Repository`] boundary is the only place atomicity is enforced.

pub mod repository;
pub mod types;

pub use repository::{InMemoryRepository, JsonFileRepository, Repository};
pub use types::{
    Cluster, CooccurrencePair, MemoryState, Note, PatternRecord, PromotionInfo, PromotionKind,
    SignalScores, Sm2Record,
};
