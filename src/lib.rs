//! patmem - Pattern memory and multi-signal scoring
//!
//! patmem keeps a growing memory of recurring words ("patterns") and short
//! timestamped notes observed across work sessions, and decides which of them
//! deserve promotion, periodic review or retrieval.
//!
//! ## Architecture
//!
//! ```text
//! session notes ──> archive/YYYY-MM-DD.md
//!                         │
//!        ┌────────────────┼─────────────────────┐
//!        ▼                ▼                     ▼
//!   lexical index    pattern batch         note indexer
//!   (BM25, PMI,      (counts, contexts,    (dedup, ids,
//!    TF-IDF)          co-occurrences)       clusters)
//!        │                │                     │
//!        ▼                ▼                     ▼
//!   signals ──────> composite scorer       habit search
//!   (retention,     ──> promotion          (confidence and
//!    decay, entropy)    candidates          freshness gates)
//!                         │
//!                         ▼
//!             BK-tree consolidation, SM-2 reviews,
//!             Bayesian and Thompson beliefs
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: the external operations and the `ingest(event)` entry point
//! - [`store`]: typed persisted records and the repository boundary
//! - [`archive`]: dated session archive files
//! - [`lexical`]: tokenizer, BM25, PMI, TF-IDF, co-occurrence detection
//! - [`signals`]: Ebbinghaus retention, time decay, Shannon entropy
//! - [`memory`]: SM-2, Bayesian and Thompson state managers
//! - [`scoring`]: composite score and promotion selection
//! - [`similarity`]: edit distance and BK-tree
//! - [`consolidate`]: near-duplicate detection and merging
//! - [`habits`]: note indexing, gated search, usage feedback
//! - [`config`]: configuration management

pub mod archive;
pub mod config;
pub mod consolidate;
pub mod engine;
pub mod error;
pub mod habits;
pub mod lexical;
pub mod memory;
pub mod scoring;
pub mod signals;
pub mod similarity;
pub mod store;

pub use config::PatmemConfig;
pub use engine::{Engine, EngineBuilder, LifecycleEvent};
pub use error::{Error, Result};
