//! Levenshtein edit distance
//!
//! Distances are counted in Unicode scalar values, not bytes, so the metric
//! stays symmetric and obeys the triangle inequality for any UTF-8 input.

/// Compute the Levenshtein distance between two strings.
///
/// Wagner-Fischer with a single rolling row. The shorter string indexes the
/// row, so auxiliary space is O(min(m, n)).
///
/// ```text
/// row[j] = cost to transform short[0..j] into long[0..i]
///
/// row[j] = min(row[j] + 1,          deletion
///              row[j - 1] + 1,      insertion
///              diag + (a != b))     substitution
/// ```
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if short.is_empty() {
        return long.len();
    }

    let mut row: Vec<usize> = (0..=short.len()).collect();

    for (i, &lc) in long.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;

        for (j, &sc) in short.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(lc != sc);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diag + cost);
            diag = above;
        }
    }

    row[short.len()]
}

/// Normalized similarity `1 - distance / max(len)`.
///
/// Two empty strings are identical (1.0); one empty string against a
/// non-empty one shares nothing (0.0).
#[must_use]
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();

    if len_a == 0 && len_b == 0 {
        return 1.0;
    }
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let max_len = len_a.max(len_b) as f64;
    1.0 - levenshtein_distance(a, b) as f64 / max_len
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: &[&str] = &[
        "", "a", "ab", "test", "tests", "testing", "tested", "text", "best", "rest",
        "kitten", "sitting", "commit", "commits", "comet", "café", "cafe", "naïve",
    ];

    #[test]
    fn test_classic_examples() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("test", "tests"), 1);
        assert_eq!(levenshtein_distance("test", "testing"), 3);
        assert_eq!(levenshtein_distance("flaw", "lawn"), 2);
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
    }

    #[test]
    fn test_identity() {
        for w in WORDS {
            assert_eq!(levenshtein_distance(w, w), 0);
        }
    }

    #[test]
    fn test_unicode_counts_chars() {
        assert_eq!(levenshtein_distance("café", "cafe"), 1);
        assert_eq!(levenshtein_distance("naïve", "naive"), 1);
    }

    #[test]
    fn test_symmetry() {
        for a in WORDS {
            for b in WORDS {
                assert_eq!(
                    levenshtein_distance(a, b),
                    levenshtein_distance(b, a),
                    "d({:?},{:?}) != d({:?},{:?})",
                    a,
                    b,
                    b,
                    a
                );
            }
        }
    }

    #[test]
    fn test_triangle_inequality() {
        for a in WORDS {
            for b in WORDS {
                for c in WORDS {
                    let ac = levenshtein_distance(a, c);
                    let ab = levenshtein_distance(a, b);
                    let bc = levenshtein_distance(b, c);
                    assert!(ac <= ab + bc, "triangle violated for {:?} {:?} {:?}", a, b, c);
                }
            }
        }
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("", "x"), 0.0);
        assert_eq!(similarity_ratio("same", "same"), 1.0);
        assert!((similarity_ratio("test", "tests") - 0.8).abs() < 1e-12);
    }
}
