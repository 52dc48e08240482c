//! BK-tree over the Levenshtein metric
//!
//! Every child edge is keyed by the child's distance to its parent. Because
//! the metric obeys the triangle inequality, a query at distance `d` from a
//! node only needs to descend into children keyed within `[d - k, d + k]`.
//! Results are always identical to a brute-force linear scan.

use super::levenshtein::levenshtein_distance;
use std::collections::BTreeMap;

/// A near-duplicate pair found by [`BkTree::find_similar_pairs`].
///
/// `first` sorts before `second`, so each unordered pair appears once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarPair {
    /// Alphabetically first member
    pub first: String,
    /// Alphabetically second member
    pub second: String,
    /// Edit distance between the members
    pub distance: usize,
}

#[derive(Debug, Clone)]
struct Node {
    word: String,
    children: BTreeMap<usize, usize>,
}

/// Arena-backed BK-tree of unique words
#[derive(Debug, Clone, Default)]
pub struct BkTree {
    nodes: Vec<Node>,
}

impl BkTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of unique words indexed
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a word. Returns `false` when the word is already present.
    ///
    /// Descends through children keyed by distance-to-parent; a distance of
    /// zero anywhere on the path means the word is a duplicate.
    pub fn add(&mut self, word: impl Into<String>) -> bool {
        let word = word.into();

        if self.nodes.is_empty() {
            self.nodes.push(Node {
                word,
                children: BTreeMap::new(),
            });
            return true;
        }

        let mut current = 0;
        loop {
            let distance = levenshtein_distance(&word, &self.nodes[current].word);
            if distance == 0 {
                return false;
            }

            match self.nodes[current].children.get(&distance) {
                Some(&child) => current = child,
                None => {
                    let index = self.nodes.len();
                    self.nodes.push(Node {
                        word,
                        children: BTreeMap::new(),
                    });
                    self.nodes[current].children.insert(distance, index);
                    return true;
                }
            }
        }
    }

    /// Whether the exact word is indexed
    pub fn contains(&self, word: &str) -> bool {
        !self.search(word, 0).is_empty()
    }

    /// All indexed words within `max_distance` of `word`.
    ///
    /// Sorted by distance, then alphabetically.
    pub fn search(&self, word: &str, max_distance: usize) -> Vec<(String, usize)> {
        let mut results = Vec::new();
        if self.nodes.is_empty() {
            return results;
        }

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            let distance = levenshtein_distance(word, &node.word);

            if distance <= max_distance {
                results.push((node.word.clone(), distance));
            }

            let low = distance.saturating_sub(max_distance);
            let high = distance + max_distance;
            for (_, &child) in node.children.range(low..=high) {
                stack.push(child);
            }
        }

        results.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        results
    }

    /// Every unordered pair of distinct indexed words within `max_distance`.
    ///
    /// Sorted by distance, then by the pair's members.
    pub fn find_similar_pairs(&self, max_distance: usize) -> Vec<SimilarPair> {
        let mut pairs = Vec::new();

        for node in &self.nodes {
            for (other, distance) in self.search(&node.word, max_distance) {
                if node.word < other {
                    pairs.push(SimilarPair {
                        first: node.word.clone(),
                        second: other,
                        distance,
                    });
                }
            }
        }

        pairs.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.first.cmp(&b.first))
                .then_with(|| a.second.cmp(&b.second))
        });
        pairs
    }

    /// Iterate over indexed words in insertion order
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.word.as_str())
    }
}

impl<S: Into<String>> FromIterator<S> for BkTree {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tree = BkTree::new();
        for word in iter {
            tree.add(word);
        }
        tree
    }
}
