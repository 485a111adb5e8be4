//! Per-position k-mer count arrays and the jump (discontinuity) predicate.
//!
//! Grounded on `original_source/source/ErrorTyping.c`'s `isJump` and
//! `typeHighQuality`: a read of length `L` with k-mer length `k` has
//! `L - k + 1` overlapping k-mers, each looked up through the table's
//! "missing means 1" wrapper, and adjacent counts are compared pairwise to
//! find sharp drops that mark the boundary of a sequencing error.

use crate::table::KmerTable;

/// Fixed jump thresholds from the original typer: a pair of adjacent counts
/// is a jump if the absolute difference exceeds both an absolute floor and a
/// fraction of the larger value. Unlike the low-coverage threshold, these do
/// not depend on the table's histogram.
const JUMP_VALUE_THRESHOLD: u32 = 3;
const JUMP_PERCENT_THRESHOLD: f64 = 0.2;

/// Computes the wrapped lookup count for every overlapping k-mer of `seq`,
/// in read order. Returns an empty vector if `seq` is shorter than `k`.
#[must_use]
pub fn count_kmers(seq: &crate::packed::PackedSequence, table: &KmerTable, k: usize) -> Vec<u32> {
    let len = seq.len();
    if len < k {
        return Vec::new();
    }
    (0..=(len - k))
        .map(|i| table.lookup(seq.get_kmer(i, i + k)))
        .collect()
}

/// True if `a` and `b` (in either order) form a jump: a difference large
/// enough in both absolute and relative terms to mark a coverage
/// discontinuity rather than ordinary sampling noise.
#[must_use]
pub fn is_jump(a: u32, b: u32) -> bool {
    let (low, high) = if a < b { (a, b) } else { (b, a) };
    let diff = f64::from(high - low);
    diff > JUMP_PERCENT_THRESHOLD * f64::from(high) && diff > f64::from(JUMP_VALUE_THRESHOLD)
}

/// True if `a, b` is a jump that goes from high coverage to low coverage in
/// that order (`a` is the high side). Used to decide which read position a
/// discontinuity implicates: the base just past the error when descending,
/// or the first base of the next k-mer when ascending.
#[must_use]
pub fn is_high_to_low(a: u32, b: u32) -> bool {
    is_jump(a, b) && a > b
}

/// Finds the first adjacent pair in `counts` that is a jump, returning the
/// index of the left element of the pair.
#[must_use]
pub fn first_jump(counts: &[u32]) -> Option<usize> {
    counts.windows(2).position(|w| is_jump(w[0], w[1]))
}

/// Maps a discontinuity found between k-mer `i` and k-mer `i+1` to the read
/// position it implicates: `i + k` (the base introduced by the second
/// k-mer) when coverage drops from high to low, `i` (the last base shared
/// only by the first k-mer) otherwise.
#[must_use]
pub fn implicated_position(counts: &[u32], i: usize, k: usize) -> usize {
    if is_high_to_low(counts[i], counts[i + 1]) {
        i + k
    } else {
        i
    }
}

/// True iff every count in `counts` exceeds `threshold` and no adjacent pair
/// is a jump. Used to tag a read High-Quality vs Low-Coverage; mirrors
/// `original_source/source/ErrorTyping.c`'s `typeHighQuality`.
#[must_use]
pub fn all_above_threshold_no_jumps(counts: &[u32], threshold: usize) -> bool {
    if counts.iter().any(|&c| (c as usize) <= threshold) {
        return false;
    }
    !counts.windows(2).any(|w| is_jump(w[0], w[1]))
}

/// True iff fewer than half of `counts` (computed from the table's *raw*,
/// unwrapped lookup, so an absent k-mer reads as 0, not 1) are exactly 1.
/// Mirrors the `isHighQuality(read)` predicate used to tag Corrected vs Bad
/// once a read's discrepancies are resolved.
#[must_use]
pub fn is_high_quality_by_rarity(raw_counts: &[u32]) -> bool {
    if raw_counts.is_empty() {
        return true;
    }
    let ones = raw_counts.iter().filter(|&&c| c == 1).count();
    (ones as f64) < 0.5 * raw_counts.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_jump_is_symmetric() {
        for (a, b) in [(10, 1), (1, 10), (100, 3), (3, 100), (5, 5), (0, 0)] {
            assert_eq!(is_jump(a, b), is_jump(b, a));
        }
    }

    #[test]
    fn small_differences_are_not_jumps() {
        assert!(!is_jump(10, 12));
        assert!(!is_jump(100, 103));
    }

    #[test]
    fn large_relative_and_absolute_difference_is_a_jump() {
        assert!(is_jump(50, 1));
        assert!(is_jump(1, 50));
    }

    #[test]
    fn absolute_floor_blocks_small_counts_even_with_large_ratio() {
        // diff=2 never exceeds JUMP_VALUE_THRESHOLD=3 regardless of ratio.
        assert!(!is_jump(2, 0));
    }

    #[test]
    fn high_to_low_direction_is_directional() {
        assert!(is_high_to_low(50, 1));
        assert!(!is_high_to_low(1, 50));
    }

    #[test]
    fn first_jump_finds_earliest_discontinuity() {
        let counts = vec![20, 22, 21, 2, 19, 18];
        assert_eq!(first_jump(&counts), Some(2));
    }

    #[test]
    fn first_jump_none_when_stable() {
        let counts = vec![20, 21, 19, 22, 20];
        assert_eq!(first_jump(&counts), None);
    }

    #[test]
    fn all_above_threshold_no_jumps_rejects_low_counts() {
        let counts = vec![20, 21, 19];
        assert!(all_above_threshold_no_jumps(&counts, 5));
        assert!(!all_above_threshold_no_jumps(&counts, 25));
    }

    #[test]
    fn all_above_threshold_no_jumps_rejects_jumps() {
        let counts = vec![20, 21, 1, 19];
        assert!(!all_above_threshold_no_jumps(&counts, 5));
    }

    #[test]
    fn rarity_predicate_counts_exact_ones_from_raw() {
        let raw = vec![1, 1, 5, 5, 5]; // 2/5 == 1 -> below 50%
        assert!(is_high_quality_by_rarity(&raw));
        let raw_bad = vec![1, 1, 1, 5, 5]; // 3/5 == 1 -> at/above 50%
        assert!(!is_high_quality_by_rarity(&raw_bad));
    }

    #[test]
    fn rarity_predicate_empty_is_high_quality() {
        assert!(is_high_quality_by_rarity(&[]));
    }
}
