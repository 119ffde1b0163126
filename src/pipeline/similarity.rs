// Text normalization and similarity scoring for frame dedup
//
// Two measures are combined: a character-level longest-matching-block
// ratio (Ratcliff/Obershelp, the classic diff ratio) and a token-level
// Jaccard index. Taking the max makes the dedup robust both to small
// character edits and to token reordering between animation frames.

use std::collections::{HashMap, HashSet};

/// Collapse whitespace runs to single spaces, trim, lowercase.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Jaccard index over whitespace-split token sets. Both sets empty is a
/// perfect match; exactly one empty is no match.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let a_tokens: HashSet<&str> = a.split(' ').filter(|t| !t.is_empty()).collect();
    let b_tokens: HashSet<&str> = b.split(' ').filter(|t| !t.is_empty()).collect();

    if a_tokens.is_empty() && b_tokens.is_empty() {
        return 1.0;
    }
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let inter = a_tokens.intersection(&b_tokens).count();
    let union = a_tokens.union(&b_tokens).count();
    inter as f64 / union as f64
}

/// Character-level sequence similarity: 2*M / (len(a) + len(b)) where M is
/// the total size of recursively matched longest common blocks.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let matches = matching_chars(&a, &b);
    2.0 * matches as f64 / (a.len() + b.len()) as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_match(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Longest common substring via the rolling j->length map.
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, &ca) in a.iter().enumerate() {
        let mut next: HashMap<usize, usize> = HashMap::new();
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                let k = j
                    .checked_sub(1)
                    .and_then(|p| j2len.get(&p))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, k);
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        j2len = next;
    }

    best
}

/// Similarity of two normalized texts in [0, 1].
pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    sequence_ratio(a, b).max(token_jaccard(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("  Hello\t\nWorld  "), "hello world");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n\t "), "");
    }

    #[test]
    fn jaccard_edge_cases() {
        assert_eq!(token_jaccard("", ""), 1.0);
        assert_eq!(token_jaccard("hello", ""), 0.0);
        assert_eq!(token_jaccard("", "hello"), 0.0);
        assert_eq!(token_jaccard("a b", "a b"), 1.0);
        assert!((token_jaccard("a b c", "b c d") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ratio_matches_difflib_semantics() {
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", "abc"), 1.0);
        assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
        // "hello world" vs "hello world.": 11 matching chars of 23 total
        let r = sequence_ratio("hello world", "hello world.");
        assert!((r - 22.0 / 23.0).abs() < 1e-9);
    }

    #[test]
    fn ratio_recurses_around_the_longest_block() {
        // "abXcd" vs "abYcd": blocks "ab" and "cd" both count
        let r = sequence_ratio("abxcd", "abycd");
        assert!((r - 8.0 / 10.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_takes_the_max_of_both_measures() {
        // Token reorder: ratio is mediocre but Jaccard is perfect
        let sim = text_similarity("world hello", "hello world");
        assert_eq!(sim, 1.0);

        // Identical short-circuits
        assert_eq!(text_similarity("same", "same"), 1.0);
    }
}
