//! Channel name similarity scoring
//!
//! The default scorer is Ratcliff/Obershelp "gestalt" matching: find the
//! longest common run of characters, recurse into the unmatched pieces on
//! either side, and report `2 * matched / (len(a) + len(b))`. Because it works
//! on contiguous runs, reordered words score low even when the word sets are
//! identical.

/// Pairwise similarity between two (already normalized) names
pub trait SimilarityScorer: Send + Sync {
    /// Score in `0.0..=1.0`
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Ratcliff/Obershelp gestalt pattern matching
#[derive(Debug, Clone, Copy, Default)]
pub struct GestaltScorer;

impl SimilarityScorer for GestaltScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        gestalt_ratio(a, b)
    }
}

/// Similarity ratio of two strings, compared character by character.
///
/// Two empty strings are identical (1.0).
pub fn gestalt_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Sum of the sizes of all recursively found longest common blocks
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Among blocks of equal size the one starting earliest in `a`, then earliest
/// in `b`, wins. Returns `(start_a, start_b, size)`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // run[k + 1] = length of the common run ending at (i - 1, blo + k)
    let mut run = vec![0usize; width + 1];
    let mut next = vec![0usize; width + 1];

    for i in alo..ahi {
        for (k, &bj) in b[blo..bhi].iter().enumerate() {
            next[k + 1] = if a[i] == bj { run[k] + 1 } else { 0 };
            let size = next[k + 1];
            if size > best.2 {
                best = (i + 1 - size, blo + k + 1 - size, size);
            }
        }
        std::mem::swap(&mut run, &mut next);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[rstest]
    #[case("abcd", "abcd", 1.0)]
    #[case("", "", 1.0)]
    #[case("abc", "", 0.0)]
    #[case("abc", "xyz", 0.0)]
    #[case("abcde", "abcdf", 0.8)]
    #[case("abcd", "bcde", 0.75)]
    fn test_known_ratios(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
        assert!(approx(gestalt_ratio(a, b), expected), "{a} vs {b}");
    }

    #[test]
    fn test_matches_classic_difflib_examples() {
        // " Thread currentThread;" (22) + "private" (7)
        assert!(approx(
            gestalt_ratio("private Thread currentThread;", "private volatile Thread currentThread;"),
            2.0 * 29.0 / 67.0
        ));
        // "WIKIMEDIA" vs "WIKIMANIA": blocks WIKIM + IA
        assert!(approx(gestalt_ratio("WIKIMEDIA", "WIKIMANIA"), 14.0 / 18.0));
    }

    #[test]
    fn test_word_order_matters() {
        let swapped = gestalt_ratio("sport one", "one sport");
        assert!(swapped < 0.8);
        assert!(approx(gestalt_ratio("sport one", "sport one"), 1.0));
    }

    #[test]
    fn test_ratio_is_symmetric_in_size_for_simple_cases() {
        let ab = gestalt_ratio("das erste hd", "das erste");
        let ba = gestalt_ratio("das erste", "das erste hd");
        assert!(approx(ab, ba));
        assert!(approx(ab, 18.0 / 21.0));
    }

    #[test]
    fn test_multibyte_characters_count_once() {
        assert!(approx(gestalt_ratio("zdf neo ü", "zdf neo u"), 16.0 / 18.0));
    }
}
