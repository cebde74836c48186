//! Approximate multi-word search over candidate strings.
//!
//! Distances come from a Damerau-Levenshtein variant that lets the query
//! start anywhere inside the candidate, so a query word is scored as a
//! fragment of the candidate rather than as a whole word.

use std::collections::BinaryHeap;

use ahash::AHashSet;

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_TOLERANCE: usize = 5;

const TRANSPOSITION_COST: usize = 1;
const DELETION_COST: usize = 1;
const INSERTION_COST: usize = 1;
const SUBSTITUTION_COST: usize = 1;
const CUT_COST: usize = usize::MAX / 2;

fn substitution(p: char, w: char) -> usize {
    if p == w {
        0
    } else {
        SUBSTITUTION_COST
    }
}

fn edit_distance_chars(pattern: &[char], word: &[char]) -> usize {
    if pattern.is_empty() {
        return 0;
    }
    if word.is_empty() {
        return pattern.len() * DELETION_COST;
    }

    // Zero first row: the pattern may begin at any position of `word`.
    let mut cost_alt = vec![0; word.len()];
    let first = SUBSTITUTION_COST.min(DELETION_COST);
    let mut cost: Vec<usize> = word
        .iter()
        .map(|&w| first * substitution(pattern[0], w))
        .collect();

    // Transpositions need d[i - 2][j - 2]; two slots of row i - 2 suffice.
    let mut lookback = [0usize; 2];

    for ip in 1..pattern.len() {
        std::mem::swap(&mut cost, &mut cost_alt);
        lookback[1] = DELETION_COST * (ip - 1);
        lookback[0] = cost[0];
        cost[0] = (substitution(pattern[ip], word[0]) + DELETION_COST * ip)
            .min(INSERTION_COST + DELETION_COST * ip)
            .min(cost_alt[0] + DELETION_COST);
        for iw in 1..word.len() {
            let mut transposition = CUT_COST;
            if pattern[ip - 1] == word[iw] && pattern[ip] == word[iw - 1] {
                transposition = lookback[iw % 2] + TRANSPOSITION_COST;
            }
            lookback[iw % 2] = cost[iw];
            cost[iw] = (cost_alt[iw - 1] + substitution(pattern[ip], word[iw]))
                .min(cost[iw - 1] + INSERTION_COST)
                .min(cost_alt[iw] + DELETION_COST)
                .min(transposition);
        }
    }
    cost.into_iter().min().unwrap_or(0)
}

/// Case-insensitive distance from `pattern` to its best match inside `word`.
pub fn edit_distance(pattern: &str, word: &str) -> usize {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let word: Vec<char> = word.to_lowercase().chars().collect();
    edit_distance_chars(&pattern, &word)
}

/// Typo budget for a query word of `len` characters.
pub fn default_limit(len: usize) -> usize {
    match len {
        0..=1 => 0,
        2..=3 => 1,
        4..=6 => 2,
        _ => 3,
    }
}

/// Distance of one query word to a candidate, given the word's budget.
///
/// A result above `limit` means the candidate is rejected; the exact value
/// is then only a lower bound.
fn subquery_distance(query: &str, candidate: &str, limit: usize) -> usize {
    let miss = candidate.chars().count().max(1) * SUBSTITUTION_COST;
    if limit == 0 {
        return if candidate.to_lowercase().contains(&query.to_lowercase()) {
            0
        } else {
            miss
        };
    }
    let len_diff = query
        .chars()
        .count()
        .saturating_sub(candidate.chars().count())
        * INSERTION_COST;
    if len_diff > limit {
        return len_diff;
    }
    edit_distance(query, candidate)
}

/// Total distance of a multi-word query, or `None` once the running total
/// exceeds `tolerance` or any word exceeds its own budget.
pub fn query_distance<S: AsRef<str>>(words: &[S], candidate: &str, tolerance: usize) -> Option<usize> {
    let mut total = 0;
    for word in words {
        let word = word.as_ref();
        let limit = default_limit(word.chars().count()).min(tolerance - total);
        let distance = subquery_distance(word, candidate, limit);
        if distance > limit {
            return None;
        }
        total += distance;
    }
    Some(total)
}

/// A ranked candidate. Ordering is by distance, then length, then text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ranked<'a> {
    pub distance: usize,
    pub len: usize,
    pub text: &'a str,
}

/// Rank `candidates` against `words`, returning at most `limit` matches,
/// best first. Repeated candidates are ranked once.
pub fn search<'a, S, I>(words: &[S], candidates: I, limit: usize, tolerance: usize) -> Vec<Ranked<'a>>
where
    S: AsRef<str>,
    I: IntoIterator<Item = &'a str>,
{
    if limit == 0 {
        return Vec::new();
    }
    // Max-heap on rank: the worst retained match sits on top.
    let mut heap: BinaryHeap<Ranked<'a>> = BinaryHeap::with_capacity(limit + 1);
    let mut seen = AHashSet::new();
    for text in candidates {
        if !seen.insert(text) {
            continue;
        }
        let Some(distance) = query_distance(words, text, tolerance) else {
            continue;
        };
        let ranked = Ranked {
            distance,
            len: text.chars().count(),
            text,
        };
        if heap.len() < limit {
            heap.push(ranked);
        } else if heap.peek().is_some_and(|worst| ranked < *worst) {
            heap.pop();
            heap.push(ranked);
        }
    }
    heap.into_sorted_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("python", "python"), 0);
        assert_eq!(edit_distance("dfg", "asdfghjkl"), 0);
        assert_eq!(edit_distance("pyhton", "python"), TRANSPOSITION_COST);
        assert_eq!(edit_distance("pyton", "python"), INSERTION_COST);
        assert_eq!(edit_distance("apython", "python"), DELETION_COST);
        assert_eq!(edit_distance("pythonic", "pythons"), SUBSTITUTION_COST + DELETION_COST);
        assert_eq!(edit_distance("python.org", "www.python"), 4 * DELETION_COST);
    }

    #[test]
    fn test_edit_distance_edges() {
        assert_eq!(edit_distance("", "anything"), 0);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("ab", "xaby"), 0);
        assert_eq!(edit_distance("PyThOn", "https://PYTHON.org"), 0);
        assert_eq!(edit_distance("gihtub", "https://github.com/rust-lang"), 1);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(default_limit(1), 0);
        assert_eq!(default_limit(2), 1);
        assert_eq!(default_limit(3), 1);
        assert_eq!(default_limit(4), 2);
        assert_eq!(default_limit(6), 2);
        assert_eq!(default_limit(7), 3);
        assert_eq!(default_limit(40), 3);
    }

    #[test]
    fn test_query_distance() {
        let words = ["rust", "lang"];
        assert_eq!(query_distance(&words, "https://www.rust-lang.org/", 5), Some(0));
        assert_eq!(query_distance(&words, "https://rustup.rs", 5), None);
        // Single characters need an exact substring.
        assert_eq!(query_distance(&["q"], "https://qt.io", 5), Some(0));
        assert_eq!(query_distance(&["z"], "https://qt.io", 5), None);
        // The overall tolerance caps each word's budget.
        assert_eq!(query_distance(&["pyhton"], "python.org", 0), None);
        assert_eq!(query_distance(&["pyhton"], "python.org", 1), Some(1));
    }

    #[test]
    fn test_search_ranks_best_first() {
        let found = search(&["pyhton"], ["java", "python"], DEFAULT_LIMIT, DEFAULT_TOLERANCE);
        assert_eq!(found[0].text, "python");
        assert_eq!(found[0].distance, 1);
        assert!(found.iter().all(|r| r.text != "java" || r.distance > 1));
    }

    #[test]
    fn test_search_order_and_dedup() {
        let candidates = [
            "https://www.python.org/",
            "python.org",
            "https://python.org",
            "python.org",
            "https://docs.python.org/3/",
        ];
        let found = search(&["python"], candidates, DEFAULT_LIMIT, DEFAULT_TOLERANCE);
        let texts: Vec<&str> = found.iter().map(|r| r.text).collect();
        assert_eq!(
            texts,
            vec![
                "python.org",
                "https://python.org",
                "https://www.python.org/",
                "https://docs.python.org/3/",
            ]
        );
        assert!(found.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_search_limit() {
        let candidates = ["a.example/x", "b.example/xx", "c.example/xxx"];
        let found = search(&["example"], candidates, 2, DEFAULT_TOLERANCE);
        let texts: Vec<&str> = found.iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["a.example/x", "b.example/xx"]);
        assert!(search(&["example"], candidates, 0, DEFAULT_TOLERANCE).is_empty());
    }
}
