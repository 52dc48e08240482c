//! Orchestration over one store and one archive
//!
//! ```text
//! host ──ingest(event)──> Engine ──load/save──> Repository (JSON file)
//!                           │
//!                           ├── archive     dated session notes
//!                           ├── lexical     BM25, PMI, TF-IDF, co-occurrence
//!                           ├── signals     retention, decay, entropy
//!                           ├── scoring     composite, promotion
//!                           ├── consolidate similar-pattern merge
//!                           └── habits      note index, search, feedback
//! ```

pub mod batch;
pub mod pipeline;
pub mod types;

pub use batch::PatternBatch;
pub use pipeline::{Engine, EngineBuilder};
pub use types::{
    IngestReport, LifecycleEvent, MemoryStats, ReviewOutcome, ScoreReport, SessionReport,
    StepFailure, UpdateStats,
};
