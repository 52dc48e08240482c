//! BM25 relevance scoring
//!
//! ```text
//! idf(df, N)  = ln((N - df + 0.5) / (df + 0.5) + 1)
//! bm25(tf, L) = idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * L / avgL))
//! ```

use crate::error::{Error, Result};
use crate::lexical::corpus::Corpus;
use crate::lexical::tokenizer::Tokenizer;
use std::collections::BTreeMap;

/// Saturation (`k1`) and length-normalization (`b`) parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    k1: f64,
    b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Params {
    /// Valid ranges: `k1` in [1.2, 2.0], `b` in [0, 1]
    pub fn new(k1: f64, b: f64) -> Result<Self> {
        if !(1.2..=2.0).contains(&k1) {
            return Err(Error::InvalidParameter(format!(
                "k1 must be within [1.2, 2.0], got {}",
                k1
            )));
        }
        if !(0.0..=1.0).contains(&b) {
            return Err(Error::InvalidParameter(format!(
                "b must be within [0, 1], got {}",
                b
            )));
        }
        Ok(Self { k1, b })
    }

    pub fn k1(&self) -> f64 {
        self.k1
    }

    pub fn b(&self) -> f64 {
        self.b
    }
}

/// Inverse document frequency
pub fn idf(doc_freq: usize, total_docs: usize) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Score of one term in one document
pub fn bm25(tf: f64, doc_len: f64, avg_doc_len: f64, idf: f64, params: Bm25Params) -> f64 {
    if tf <= 0.0 {
        return 0.0;
    }
    let ratio = if avg_doc_len > 0.0 {
        doc_len / avg_doc_len
    } else {
        1.0
    };
    let length_norm = 1.0 - params.b + params.b * ratio;
    idf * (tf * (params.k1 + 1.0)) / (tf + params.k1 * length_norm)
}

/// Score a query against one tokenized document of `corpus`
pub fn score_document(
    query_terms: &[String],
    document: &[String],
    corpus: &Corpus,
    params: Bm25Params,
) -> f64 {
    let total = corpus.len();
    let avg = corpus.avg_doc_len();
    let doc_len = document.len() as f64;

    query_terms
        .iter()
        .map(|term| {
            let tf = document.iter().filter(|t| *t == term).count() as f64;
            if tf == 0.0 {
                return 0.0;
            }
            bm25(tf, doc_len, avg, idf(corpus.doc_freq(term), total), params)
        })
        .sum()
}

/// Corpus-level BM25 of each pattern.
///
/// Each pattern token contributes with its mean term frequency across
/// documents and a document length equal to the corpus average. An empty
/// corpus yields an empty map.
pub fn score_patterns<'a, I>(
    patterns: I,
    corpus: &Corpus,
    tokenizer: &Tokenizer,
    params: Bm25Params,
) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut scores = BTreeMap::new();
    if corpus.is_empty() {
        return scores;
    }

    let total = corpus.len();
    let avg = corpus.avg_doc_len();

    for pattern in patterns {
        let score: f64 = tokenizer
            .tokenize(pattern)
            .iter()
            .filter(|token| corpus.doc_freq(token) > 0)
            .map(|token| {
                let tf = corpus.total_term_frequency(token) as f64 / total as f64;
                bm25(tf, avg, avg, idf(corpus.doc_freq(token), total), params)
            })
            .sum();
        scores.insert(pattern.clone(), score);
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_params_validation() {
        assert!(Bm25Params::new(1.5, 0.75).is_ok());
        assert!(Bm25Params::new(1.0, 0.75).is_err());
        assert!(Bm25Params::new(2.1, 0.75).is_err());
        assert!(Bm25Params::new(1.5, 1.5).is_err());
    }

    #[test]
    fn test_idf_values() {
        assert!((idf(1, 10) - 1.992).abs() < 1e-3);
        assert!((idf(5, 10) - 0.693).abs() < 1e-3);
        assert!((idf(10, 10) - 0.047).abs() < 1e-3);
    }

    #[test]
    fn test_bm25_formula() {
        let p = Bm25Params::default();
        let score = bm25(3.0, 100.0, 100.0, 2.0, p);
        // 2 * 3 * 2.5 / (3 + 1.5)
        assert!((score - 15.0 / 4.5).abs() < 1e-12);
        assert_eq!(bm25(0.0, 100.0, 100.0, 2.0, p), 0.0);
    }

    #[test]
    fn test_longer_documents_score_lower() {
        let p = Bm25Params::default();
        let short = bm25(2.0, 50.0, 100.0, 1.0, p);
        let long = bm25(2.0, 200.0, 100.0, 1.0, p);
        assert!(short > long);
    }

    #[test]
    fn test_score_document_counts_overlap_only() {
        let corpus: Corpus = vec![
            words("run tests before commit"),
            words("check documentation"),
        ]
        .into_iter()
        .collect();
        let p = Bm25Params::default();
        let q = words("run tests");
        let first = score_document(&q, &corpus.documents()[0], &corpus, p);
        let second = score_document(&q, &corpus.documents()[1], &corpus, p);
        assert!(first > 0.0);
        assert_eq!(second, 0.0);
    }

    #[test]
    fn test_score_patterns_empty_corpus() {
        let tok = Tokenizer::new().unwrap();
        let patterns = vec!["test".to_string()];
        let scores = score_patterns(&patterns, &Corpus::new(), &tok, Bm25Params::default());
        assert!(scores.is_empty());
    }

    #[test]
    fn test_score_patterns_unknown_pattern_is_zero() {
        let tok = Tokenizer::new().unwrap();
        let corpus: Corpus = vec![words("deploy tests tests"), words("deploy docs")]
            .into_iter()
            .collect();
        let patterns = vec!["tests".to_string(), "missing".to_string()];
        let scores = score_patterns(&patterns, &corpus, &tok, Bm25Params::default());
        assert!(scores["tests"] > 0.0);
        assert_eq!(scores["missing"], 0.0);
    }
}
