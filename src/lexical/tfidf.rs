//! TF-IDF pattern weighting

use crate::lexical::corpus::Corpus;
use crate::lexical::tokenizer::{is_stopword, Tokenizer};
use std::collections::BTreeMap;

/// IDF and TF-IDF of one pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TfidfScore {
    pub idf: f64,
    pub tfidf: f64,
    pub is_stopword: bool,
}

/// `idf = ln(N / (df + 1))`
pub fn idf(doc_freq: usize, total_docs: usize) -> f64 {
    (total_docs as f64 / (doc_freq as f64 + 1.0)).ln()
}

/// Score each `(pattern, count)` against `corpus`; empty corpus gives an empty map
pub fn tfidf_scores<'a, I>(
    patterns: I,
    corpus: &Corpus,
    tokenizer: &Tokenizer,
) -> BTreeMap<String, TfidfScore>
where
    I: IntoIterator<Item = (&'a String, u64)>,
{
    let mut scores = BTreeMap::new();
    if corpus.is_empty() {
        return scores;
    }

    for (pattern, count) in patterns {
        let tokens = tokenizer.tokenize(pattern);
        let df = corpus.docs_containing_all(&tokens);
        let idf = idf(df, corpus.len());
        scores.insert(
            pattern.clone(),
            TfidfScore {
                idf,
                tfidf: count as f64 * idf,
                is_stopword: is_stopword(pattern),
            },
        );
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Corpus {
        ["deploy the tests", "tests again", "docs", "the docs"]
            .iter()
            .map(|d| d.split_whitespace().map(|w| w.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_idf_formula() {
        assert!((idf(1, 4) - 2.0f64.ln()).abs() < 1e-12);
        assert!(idf(3, 4) == 0.0);
    }

    #[test]
    fn test_rare_patterns_outscore_common() {
        let tok = Tokenizer::new().unwrap();
        let deploy = "deploy".to_string();
        let tests = "tests".to_string();
        let the = "the".to_string();
        let scores = tfidf_scores(
            vec![(&deploy, 2), (&tests, 2), (&the, 2)],
            &corpus(),
            &tok,
        );
        assert!(scores["deploy"].tfidf > scores["tests"].tfidf);
        assert!(scores["the"].is_stopword);
        assert!(!scores["deploy"].is_stopword);
    }

    #[test]
    fn test_empty_corpus_gives_no_scores() {
        let tok = Tokenizer::new().unwrap();
        let p = "deploy".to_string();
        assert!(tfidf_scores(vec![(&p, 1)], &Corpus::new(), &tok).is_empty());
    }
}
