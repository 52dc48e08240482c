//! Line-level word co-occurrence detection

use crate::error::Result;
use crate::lexical::tokenizer::Tokenizer;
use crate::store::types::CooccurrencePair;
use std::collections::HashMap;

/// Count unordered word pairs sharing a line across `texts`, keeping the
/// `top_n` most frequent. Ties are ordered by the pair's words.
pub fn detect_cooccurrences<'a, I>(
    tokenizer: &Tokenizer,
    texts: I,
    top_n: usize,
) -> Result<Vec<CooccurrencePair>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<(String, String), u64> = HashMap::new();

    for text in texts {
        for line in text.lines() {
            let words = tokenizer.extract_cooccurrence_words(line);
            for (i, a) in words.iter().enumerate() {
                for b in &words[i + 1..] {
                    *counts.entry((a.clone(), b.clone())).or_insert(0) += 1;
                }
            }
        }
    }

    let mut ranked: Vec<((String, String), u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_n);

    ranked
        .into_iter()
        .map(|((a, b), count)| CooccurrencePair::new(a, b, count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_counted_per_line() {
        let tok = Tokenizer::new().unwrap();
        let archive = "[09:00] python testing code\n[09:30] python testing\n[10:00] docs";
        let pairs = detect_cooccurrences(&tok, [archive], 10).unwrap();

        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].words(), ("python", "testing"));
        assert_eq!(pairs[0].count, 2);
        assert_eq!(pairs[1].words(), ("code", "python"));
        assert_eq!(pairs[2].words(), ("code", "testing"));
    }

    #[test]
    fn test_top_n_truncates() {
        let tok = Tokenizer::new().unwrap();
        let pairs = detect_cooccurrences(&tok, ["aaa bbb ccc ddd"], 2).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].words(), ("aaa", "bbb"));
        assert_eq!(pairs[1].words(), ("aaa", "ccc"));
    }

    #[test]
    fn test_single_word_lines_produce_nothing() {
        let tok = Tokenizer::new().unwrap();
        let pairs = detect_cooccurrences(&tok, ["alone\nsolo"], 5).unwrap();
        assert!(pairs.is_empty());
    }
}
