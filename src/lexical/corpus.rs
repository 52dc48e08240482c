//! Document-frequency statistics over a tokenized corpus

use std::collections::{HashMap, HashSet};

/// Tokenized documents plus document frequencies
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    total_len: usize,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tokenized document
    pub fn add_document(&mut self, tokens: Vec<String>) {
        let unique: HashSet<&String> = tokens.iter().collect();
        for term in unique {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
        self.total_len += tokens.len();
        self.documents.push(tokens);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Vec<String>] {
        &self.documents
    }

    /// Number of documents containing `term`
    pub fn doc_freq(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }

    /// Mean document length in tokens, 0 for an empty corpus
    pub fn avg_doc_len(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.documents.len() as f64
        }
    }

    /// Occurrences of `term` across all documents
    pub fn total_term_frequency(&self, term: &str) -> usize {
        self.documents
            .iter()
            .map(|doc| doc.iter().filter(|t| *t == term).count())
            .sum()
    }

    /// Documents that contain every one of `terms`
    pub fn docs_containing_all(&self, terms: &[String]) -> usize {
        if terms.is_empty() {
            return 0;
        }
        self.documents
            .iter()
            .filter(|doc| terms.iter().all(|t| doc.contains(t)))
            .count()
    }
}

impl FromIterator<Vec<String>> for Corpus {
    fn from_iter<I: IntoIterator<Item = Vec<String>>>(iter: I) -> Self {
        let mut corpus = Corpus::new();
        for doc in iter {
            corpus.add_document(doc);
        }
        corpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_statistics() {
        let corpus: Corpus = vec![
            doc(&["run", "tests", "tests"]),
            doc(&["check", "docs"]),
            doc(&["run", "build", "deploy", "tests"]),
        ]
        .into_iter()
        .collect();

        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.doc_freq("tests"), 2);
        assert_eq!(corpus.doc_freq("missing"), 0);
        assert!((corpus.avg_doc_len() - 3.0).abs() < 1e-12);
        assert_eq!(corpus.total_term_frequency("tests"), 3);
        assert_eq!(corpus.docs_containing_all(&doc(&["run", "tests"])), 2);
        assert_eq!(corpus.docs_containing_all(&doc(&["run", "docs"])), 0);
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = Corpus::new();
        assert!(corpus.is_empty());
        assert_eq!(corpus.avg_doc_len(), 0.0);
        assert_eq!(corpus.docs_containing_all(&[]), 0);
    }
}
