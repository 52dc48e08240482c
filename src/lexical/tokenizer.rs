//! Tokenization and pattern-word extraction
//!
//! All regexes are compiled once in [`Tokenizer::new`] and shared by every
//! calculator that reads archive text.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

/// English function words that carry no pattern signal
pub const STOPWORDS: &[&str] = &[
    "and", "the", "for", "with", "that", "this", "from", "have", "has", "had", "but", "not",
    "are", "was", "were", "been", "being", "you", "your", "they", "their", "what", "which",
    "who", "when", "where", "why", "how", "can", "could", "would", "should", "will", "shall",
    "may", "might", "must",
];

/// Case-insensitive stopword check
pub fn is_stopword(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOPWORDS.contains(&lower.as_str())
}

/// A `[HH:MM] text` archive line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteLine {
    pub hour: u32,
    pub minute: u32,
    pub text: String,
}

/// Compiled regex set for archive text
#[derive(Debug, Clone)]
pub struct Tokenizer {
    word: Regex,
    pattern_word: Regex,
    cooccurrence_word: Regex,
    timestamp: Regex,
    note_line: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::Internal(format!("Invalid regex '{}': {}", pattern, e)))
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            word: compile(r"\w+")?,
            pattern_word: compile(r"\b[a-zA-Z][a-zA-Z0-9]{2,}\b")?,
            cooccurrence_word: compile(r"[a-z]{3,}")?,
            timestamp: compile(r"\[\d{2}:\d{2}\]")?,
            note_line: compile(r"^\[(\d{2}):(\d{2})\]\s*(.+?)\s*$")?,
        })
    }

    /// Lowercase runs of word characters
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.word
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Remove `[HH:MM]` stamps
    pub fn strip_timestamps(&self, text: &str) -> String {
        self.timestamp.replace_all(text, "").into_owned()
    }

    /// Candidate pattern words in order of appearance, lowercased
    pub fn extract_pattern_words(&self, text: &str) -> Vec<String> {
        let stripped = self.strip_timestamps(text);
        self.pattern_word
            .find_iter(&stripped)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    /// Top `top_n` pattern words by frequency, ties alphabetical
    pub fn detect_patterns(&self, text: &str, top_n: usize) -> Vec<(String, u64)> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for word in self.extract_pattern_words(text) {
            *counts.entry(word).or_insert(0) += 1;
        }
        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top_n);
        ranked
    }

    /// Sorted unique words of one line used for co-occurrence counting
    pub fn extract_cooccurrence_words(&self, line: &str) -> Vec<String> {
        let lower = self.strip_timestamps(line).to_lowercase();
        self.cooccurrence_word
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Parse a `[HH:MM] text` line; anything else is `None`
    pub fn parse_note_line(&self, line: &str) -> Option<NoteLine> {
        let caps = self.note_line.captures(line.trim())?;
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        let text = caps.get(3)?.as_str().to_string();
        Some(NoteLine { hour, minute, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok() -> Tokenizer {
        Tokenizer::new().unwrap()
    }

    #[test]
    fn test_tokenize_lowercases_word_runs() {
        assert_eq!(tok().tokenize("Hello, World!"), vec!["hello", "world"]);
        assert_eq!(
            tok().tokenize("BM25 scoring_v2"),
            vec!["bm25", "scoring_v2"]
        );
        assert!(tok().tokenize("  ... ").is_empty());
    }

    #[test]
    fn test_pattern_words_skip_timestamps_and_short_words() {
        let words = tok().extract_pattern_words("[10:30] Fix the DB migration in v2 api");
        assert_eq!(words, vec!["fix", "the", "migration", "api"]);
    }

    #[test]
    fn test_detect_patterns_orders_by_count_then_alpha() {
        let text = "[09:00] deploy tests\n[09:10] tests deploy build\n[09:20] tests";
        let top = tok().detect_patterns(text, 2);
        assert_eq!(
            top,
            vec![("tests".to_string(), 3), ("deploy".to_string(), 2)]
        );
    }

    #[test]
    fn test_cooccurrence_words_sorted_unique() {
        let words = tok().extract_cooccurrence_words("[12:00] Testing code, testing PYTHON ok");
        assert_eq!(words, vec!["code", "python", "testing"]);
    }

    #[test]
    fn test_parse_note_line() {
        let line = tok().parse_note_line("[14:05]   Run tests before commit  ").unwrap();
        assert_eq!(line.hour, 14);
        assert_eq!(line.minute, 5);
        assert_eq!(line.text, "Run tests before commit");

        assert!(tok().parse_note_line("no stamp here").is_none());
        assert!(tok().parse_note_line("[25:00] bad hour").is_none());
        assert!(tok().parse_note_line("[10:00]").is_none());
    }

    #[test]
    fn test_stopwords() {
        assert!(is_stopword("the"));
        assert!(is_stopword("THE"));
        assert!(!is_stopword("python"));
    }
}
