//! Fuzzy string matching
//!
//! Similarity is normalized edit distance: Levenshtein distance divided by
//! the longer string's length, inverted to a score in [0, 1]. Matching is
//! case-insensitive, which is what catalog search callers expect.

use std::collections::HashMap;
use std::hash::Hash;

/// Edit-distance based similarity scoring
pub struct FuzzyMatcher;

impl FuzzyMatcher {
    /// Similarity between two strings in [0, 1]
    ///
    /// Identical strings (and two empty strings) score 1.0; an empty string
    /// against a non-empty one scores 0.0.
    pub fn similarity(a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.to_lowercase().chars().collect();
        let b: Vec<char> = b.to_lowercase().chars().collect();

        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }

        let distance = levenshtein(&a, &b);
        let longest = a.len().max(b.len());
        1.0 - distance as f64 / longest as f64
    }

    /// Keep only candidates whose similarity to `term` is at least `threshold`
    ///
    /// Keys are preserved; no ordering is implied.
    pub fn filter_by_threshold<K: Eq + Hash + Clone>(
        term: &str,
        candidates: &HashMap<K, String>,
        threshold: f64,
    ) -> HashMap<K, String> {
        candidates
            .iter()
            .filter(|(_, candidate)| Self::similarity(term, candidate) >= threshold)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Levenshtein distance with a two-row table
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
