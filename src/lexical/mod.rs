//! Lexical statistics over archived session text
//!
//! Tokenization, corpus document frequencies, and the relevance and
//! association measures computed from them (BM25, PMI, TF-IDF).

pub mod bm25;
pub mod cooccurrence;
pub mod corpus;
pub mod pmi;
pub mod tfidf;
pub mod tokenizer;

pub use bm25::Bm25Params;
pub use cooccurrence::detect_cooccurrences;
pub use corpus::Corpus;
pub use tfidf::TfidfScore;
pub use tokenizer::{is_stopword, NoteLine, Tokenizer, STOPWORDS};
