//! Per-read correction engine: discrepancy scanning, candidate edit search,
//! scoring, and homopolymer-resize fallback.
//!
//! Grounded on `original_source/source/ErrorCorrection.c`'s `correctRead`
//! and `evaluateCorrection`, reworked per the design notes in the
//! specification this crate implements: the mutable, function-pointer-driven
//! `Correction` record becomes an immutable [`CorrectionConfig`], and the
//! global accumulator counters become a [`Statistics`] value returned per
//! read and summed by the pipeline driver.

use crate::discontinuity::{count_kmers, is_high_to_low, is_jump};
use crate::kmer::KmerLength;
use crate::packed::Base;
use crate::record::{CorrectionEvent, ReadRecord, ReadTag, ScratchSequence};
use crate::stats::Statistics;
use crate::table::KmerTable;

/// Immutable correction policy, parsed once from the CLI and shared by
/// reference between the pipeline driver and the engine. The engine never
/// mutates it.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionConfig {
    pub k: KmerLength,
    pub substitutions: bool,
    pub insertions: bool,
    pub deletions: bool,
    pub homopolymers: bool,
    pub filtering: bool,
}

const PHRED33_ZERO: u8 = 33;

/// Integer average of the qualities flanking `pos`, falling back to a
/// single neighbor when the other is out of bounds, or Phred-33 zero when
/// neither exists.
fn flanking_quality(quality: &[u8], pos: usize) -> u8 {
    let before = pos.checked_sub(1).and_then(|p| quality.get(p).copied());
    let after = quality.get(pos).copied();
    match (before, after) {
        (Some(a), Some(b)) => ((u16::from(a) + u16::from(b)) / 2) as u8,
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => PHRED33_ZERO,
    }
}

fn build_discrepancies(counts: &[u32]) -> Vec<i64> {
    if counts.len() < 2 {
        return Vec::new();
    }
    (0..counts.len() - 1)
        .map(|i| {
            if is_jump(counts[i], counts[i + 1]) {
                let (low, high) = if counts[i] < counts[i + 1] {
                    (counts[i], counts[i + 1])
                } else {
                    (counts[i + 1], counts[i])
                };
                i64::from(high - low)
            } else {
                -1
            }
        })
        .collect()
}

fn select_highest_discrepancy(discrepancies: &[i64]) -> Option<usize> {
    discrepancies
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d > 0)
        .max_by_key(|&(i, &d)| (d, std::cmp::Reverse(i)))
        .map(|(i, _)| i)
}

/// Score a candidate edit: the number of consecutive, previously-jumping
/// adjacent count pairs starting at `start` (scanning in the direction of
/// the original discontinuity) that are no longer jumps after the edit.
fn evaluate(counts: &[u32], start: usize, high_to_low: bool) -> i64 {
    if counts.len() < 2 {
        return 0;
    }
    let mut score = 0i64;
    if high_to_low {
        let mut j = start;
        while j + 1 < counts.len() && !is_jump(counts[j], counts[j + 1]) {
            score += 1;
            j += 1;
        }
    } else {
        let mut j = start;
        loop {
            if j + 1 >= counts.len() || is_jump(counts[j], counts[j + 1]) {
                break;
            }
            score += 1;
            if j == 0 {
                break;
            }
            j -= 1;
        }
    }
    score
}

#[derive(Debug, Clone, Copy)]
enum Candidate {
    Sub(Base),
    Ins,
    DelL(Base),
    DelR(Base),
}

const ALL_BASES: [Base; 4] = [Base::A, Base::G, Base::C, Base::T];

fn candidates(config: &CorrectionConfig) -> Vec<Candidate> {
    let mut out = Vec::with_capacity(13);
    if config.substitutions {
        out.extend(ALL_BASES.into_iter().map(Candidate::Sub));
    }
    if config.insertions {
        out.push(Candidate::Ins);
    }
    if config.deletions {
        out.extend(ALL_BASES.into_iter().map(Candidate::DelL));
        out.extend(ALL_BASES.into_iter().map(Candidate::DelR));
    }
    out
}

/// Required minimum score for a candidate edit to be accepted.
const ACCEPT_THRESHOLD: i64 = 2;

struct Attempt {
    candidate: Candidate,
    score: i64,
}

/// Tries every enabled single-base candidate edit at discrepancy index `i`,
/// applies the best-scoring one if it clears the acceptance threshold, and
/// reports success. `counts` is the wrapped-lookup count array for the
/// scratch sequence's *current* state.
fn attempt_single_base_correction(
    scratch: &mut ScratchSequence,
    table: &KmerTable,
    counts: &[u32],
    i: usize,
    k: usize,
    config: &CorrectionConfig,
) -> bool {
    let high_to_low = is_high_to_low(counts[i], counts[i + 1]);
    let seq_pos = if high_to_low { i + k } else { i };

    let mut best: Option<Attempt> = None;
    for candidate in candidates(config) {
        let score = trial_score(scratch, table, candidate, seq_pos, i, k, high_to_low);
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(Attempt { candidate, score });
        }
    }

    let Some(best) = best else { return false };
    if best.score < ACCEPT_THRESHOLD {
        return false;
    }

    apply_candidate(scratch, best.candidate, seq_pos);
    scratch.record_event(candidate_event(best.candidate));
    true
}

fn trial_score(
    scratch: &ScratchSequence,
    table: &KmerTable,
    candidate: Candidate,
    seq_pos: usize,
    i: usize,
    k: usize,
    high_to_low: bool,
) -> i64 {
    let mut trial = scratch.clone();
    let len_before = trial.sequence.len();
    apply_candidate(&mut trial, candidate, seq_pos);

    // Insertions/deletions shift the read length; a low->high discontinuity
    // has its target on the low side, to the left of the edit, so the
    // count-array index realigns by one base in the direction the edit
    // shifted positions past it. A high->low discontinuity's target is
    // already past the edit position, so no realignment is needed.
    let len_after = trial.sequence.len();
    let start = if high_to_low || len_after == len_before {
        i
    } else if len_after < len_before {
        i.saturating_sub(1)
    } else {
        i + 1
    };

    let counts = count_kmers(&trial.sequence, table, k);
    let mut score = evaluate(&counts, start.min(counts.len().saturating_sub(2)), high_to_low);
    if matches!(candidate, Candidate::DelL(_) | Candidate::DelR(_)) {
        score -= 1;
    }
    score
}

fn apply_candidate(scratch: &mut ScratchSequence, candidate: Candidate, seq_pos: usize) {
    match candidate {
        Candidate::Sub(base) => {
            scratch.sequence.set_base(seq_pos, base);
            scratch.quality[seq_pos] = flanking_quality(&scratch.quality, seq_pos);
        }
        Candidate::Ins => {
            scratch.sequence.delete(seq_pos);
            scratch.quality.remove(seq_pos);
        }
        Candidate::DelL(base) => {
            scratch.sequence.insert(seq_pos, base);
            let q = flanking_quality(&scratch.quality, seq_pos);
            scratch.quality.insert(seq_pos, q);
        }
        Candidate::DelR(base) => {
            let pos = seq_pos + 1;
            scratch.sequence.insert(pos, base);
            let q = flanking_quality(&scratch.quality, pos);
            scratch.quality.insert(pos, q);
        }
    }
}

fn candidate_event(candidate: Candidate) -> CorrectionEvent {
    match candidate {
        Candidate::Sub(_) => CorrectionEvent::Substitution,
        Candidate::Ins => CorrectionEvent::Insertion,
        Candidate::DelL(_) | Candidate::DelR(_) => CorrectionEvent::Deletion,
    }
}

/// Homopolymer-resize fallback: tries run lengths in `[max(r/2,1), 2r]` and
/// commits whichever yields the best average count over a 2-k-mer window on
/// the discontinuity's high-coverage side.
fn attempt_homopolymer_correction(
    scratch: &mut ScratchSequence,
    table: &KmerTable,
    counts: &[u32],
    i: usize,
    k: usize,
) -> bool {
    let high_to_low = is_high_to_low(counts[i], counts[i + 1]);
    let seq_pos = if high_to_low { i + k } else { i };
    let probe = if high_to_low {
        seq_pos.min(scratch.sequence.len() - 1)
    } else {
        (seq_pos + 1).min(scratch.sequence.len() - 1)
    };

    let leftmost = scratch.sequence.homopolymer_leftmost(probe);
    let run_base = scratch.sequence.get_base(leftmost);
    let original_len = scratch.sequence.homopolymer_length(probe);

    let lower = (original_len / 2).max(1);
    let upper = original_len * 2;

    let mut best_len = original_len;
    let mut best_avg = f64::MIN;

    for candidate_len in lower..=upper {
        if candidate_len >= k {
            continue;
        }
        let mut trial = scratch.clone();
        let resized_total_len =
            trial.sequence.len() as i64 - original_len as i64 + candidate_len as i64;
        if resized_total_len <= k as i64 {
            continue;
        }
        resize_homopolymer(&mut trial, leftmost, original_len, candidate_len, run_base);

        let window_start = if high_to_low {
            leftmost as i64 - k as i64 + 1 + candidate_len as i64
        } else {
            leftmost as i64 - 2
        };
        if window_start < 0 {
            continue;
        }
        let window_start = window_start as usize;
        let trial_counts = count_kmers(&trial.sequence, table, k);
        if window_start + 1 >= trial_counts.len() {
            continue;
        }
        let avg =
            f64::from(trial_counts[window_start] + trial_counts[window_start + 1]) / 2.0;
        if avg > best_avg {
            best_avg = avg;
            best_len = candidate_len;
        }
    }

    if best_len == original_len {
        return false;
    }

    let delta = best_len as i32 - original_len as i32;
    resize_homopolymer(scratch, leftmost, original_len, best_len, run_base);
    scratch.record_event(CorrectionEvent::Homopolymer(delta));
    true
}

fn resize_homopolymer(
    scratch: &mut ScratchSequence,
    leftmost: usize,
    original_len: usize,
    new_len: usize,
    run_base: Base,
) {
    if new_len < original_len {
        for _ in 0..(original_len - new_len) {
            scratch.sequence.delete(leftmost);
            scratch.quality.remove(leftmost);
        }
    } else if new_len > original_len {
        for _ in 0..(new_len - original_len) {
            scratch.sequence.insert(leftmost, run_base);
            let q = flanking_quality(&scratch.quality, leftmost);
            scratch.quality.insert(leftmost, q);
        }
    }
}

fn attempt_correction(
    scratch: &mut ScratchSequence,
    table: &KmerTable,
    counts: &[u32],
    i: usize,
    k: usize,
    config: &CorrectionConfig,
) -> bool {
    let discrepancy_len = counts.len().saturating_sub(1);
    if !(i > 0 && i < discrepancy_len.saturating_sub(1)) {
        return false;
    }

    if attempt_single_base_correction(scratch, table, counts, i, k, config) {
        let applied = scratch.log.last().copied();
        debug_assert!(applied.is_some());
        return true;
    }

    if config.homopolymers && attempt_homopolymer_correction(scratch, table, counts, i, k) {
        return true;
    }

    false
}

/// `isHighQuality(read)`: fewer than 50% of raw (pre-wrapper) k-mer lookups
/// are exactly 1.
fn is_high_quality_by_rarity(sequence: &crate::packed::PackedSequence, table: &KmerTable, k: usize) -> bool {
    let len = sequence.len();
    if len < k {
        return true;
    }
    let raw: Vec<u32> = (0..=(len - k))
        .map(|i| table.get_raw(sequence.get_kmer(i, i + k)))
        .collect();
    crate::discontinuity::is_high_quality_by_rarity(&raw)
}

fn record_stat(stats: &mut Statistics, event: CorrectionEvent) {
    match event {
        CorrectionEvent::Substitution => stats.substitutions += 1,
        CorrectionEvent::Insertion => stats.insertions += 1,
        CorrectionEvent::Deletion => stats.deletions += 1,
        CorrectionEvent::Homopolymer(delta) => {
            stats.homopolymers += 1;
            stats.record_homopolymer_delta(delta);
        }
    }
}

/// Runs the full per-read correction loop and returns the statistics
/// accumulated for this read. `record` is mutated in place: on a
/// successful commit its sequence/quality are replaced; on failure or
/// no-op it is left untouched apart from its `tag`. `low_kmer_threshold` is
/// the value produced by [`crate::table::KmerTable::preprocess`].
pub fn correct_read(
    record: &mut ReadRecord,
    table: &KmerTable,
    config: &CorrectionConfig,
    low_kmer_threshold: usize,
) -> Statistics {
    let k = config.k.get();
    let len = record.len();
    let mut stats = Statistics::default();

    if len <= k {
        return stats;
    }

    let mut scratch = ScratchSequence::from_record(record);
    let mut counts = count_kmers(&scratch.sequence, table, k);
    let mut discrepancies = build_discrepancies(&counts);
    let mut any_attempt = false;

    loop {
        let Some(i) = select_highest_discrepancy(&discrepancies) else {
            break;
        };
        any_attempt = true;

        let before = scratch.log.len();
        let success = attempt_correction(&mut scratch, table, &counts, i, k, config);
        if success {
            if scratch.log.len() > before {
                record_stat(&mut stats, *scratch.log.last().unwrap());
            }
            counts = count_kmers(&scratch.sequence, table, k);
            discrepancies = build_discrepancies(&counts);
        } else {
            discrepancies[i] = -1;
        }

        if scratch.budget_exhausted() {
            break;
        }
    }

    if !any_attempt {
        record.tag = if crate::discontinuity::all_above_threshold_no_jumps(&counts, low_kmer_threshold) {
            ReadTag::HighQuality
        } else {
            ReadTag::LowCoverage
        };
        return stats;
    }

    let num_corrections = scratch.num_corrections();
    if num_corrections < 30 {
        let high_quality = is_high_quality_by_rarity(&scratch.sequence, table, k);
        record.commit(scratch);
        record.tag = if high_quality {
            ReadTag::Corrected
        } else {
            ReadTag::Bad
        };
    } else {
        record.tag = ReadTag::Bad;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packed::{Base, PackedSequence};
    use crate::record::ReadRecord;

    fn seq(s: &str) -> PackedSequence {
        let bases: Vec<Base> = s.bytes().map(|b| Base::from_ascii(b).unwrap()).collect();
        PackedSequence::from_bases(&bases)
    }

    fn uniform_table(reference: &str, k: usize, count: u32) -> KmerTable {
        let mut table = KmerTable::new();
        let s = seq(reference);
        for i in 0..=(s.len() - k) {
            let kmer = s.get_kmer(i, i + k);
            for _ in 0..count {
                table.increment(kmer).unwrap();
            }
        }
        table
    }

    fn default_config(k: usize) -> CorrectionConfig {
        CorrectionConfig {
            k: KmerLength::new(k).unwrap(),
            substitutions: true,
            insertions: true,
            deletions: true,
            homopolymers: true,
            filtering: true,
        }
    }

    #[test]
    fn clean_read_is_tagged_high_quality() {
        let reference = "AAAAACCCCCGGGGGTTTTT";
        let table = uniform_table(reference, 5, 10);
        let mut record = ReadRecord::new(
            "@r1".into(),
            "+".into(),
            seq(reference),
            vec![40; reference.len()],
            1,
        );
        let config = default_config(5);
        correct_read(&mut record, &table, &config, 2);
        assert_eq!(record.tag, ReadTag::HighQuality);
    }

    #[test]
    fn single_substitution_is_corrected_back() {
        let reference = "AAAAACCCCCGGGGGTTTTT";
        let table = uniform_table(reference, 5, 10);
        let mut mutated: Vec<u8> = reference.bytes().collect();
        mutated[10] = b'A'; // was G
        let mutated = String::from_utf8(mutated).unwrap();

        let mut record = ReadRecord::new(
            "@r1".into(),
            "+".into(),
            seq(&mutated),
            vec![40; mutated.len()],
            1,
        );
        let config = default_config(5);
        correct_read(&mut record, &table, &config, 2);
        assert_eq!(record.tag, ReadTag::Corrected);
        for p in 0..reference.len() {
            assert_eq!(
                record.sequence.get_base(p),
                seq(reference).get_base(p),
                "position {p} mismatch"
            );
        }
    }

    #[test]
    fn short_read_is_left_untouched() {
        let reference = "AAAAACCCCCGGGGGTTTTT";
        let table = uniform_table(reference, 5, 10);
        let mut record =
            ReadRecord::new("@r1".into(), "+".into(), seq("ACG"), vec![40; 3], 1);
        let config = default_config(5);
        correct_read(&mut record, &table, &config, 2);
        assert_eq!(record.tag, ReadTag::Unknown);
        assert_eq!(record.sequence.len(), 3);
    }

    #[test]
    fn flanking_quality_averages_neighbors() {
        let q = vec![20, 40, 10];
        assert_eq!(flanking_quality(&q, 1), 30);
    }

    #[test]
    fn flanking_quality_falls_back_to_single_neighbor() {
        let q = vec![20];
        assert_eq!(flanking_quality(&q, 0), 20);
        assert_eq!(flanking_quality(&q, 1), 20);
    }

    #[test]
    fn flanking_quality_falls_back_to_phred_zero() {
        let q: Vec<u8> = vec![];
        assert_eq!(flanking_quality(&q, 0), PHRED33_ZERO);
    }
}
