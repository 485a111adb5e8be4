//! K-mer abundance table: a chained hash table keyed by packed k-mer value,
//! with prime-sized buckets, singleton pruning, and low-coverage threshold
//! inference from the count histogram.
//!
//! The table is built once across all input files, preprocessed once, and
//! is read-only for the remainder of a run. Lookups come in two flavors:
//! [`KmerTable::get_raw`] (0 means "never seen"), used where "absent" and
//! "present" must stay distinguishable, and [`KmerTable::lookup`] (missing
//! collapses to 1, "as rare as possible"), used by the correction engine's
//! count arrays.

use crate::error::TableError;
use crate::packed::PackedSequence;

/// Bucket sizes roughly doubling, used to grow/shrink the table. Growing
/// past the last entry is treated as an allocation failure per the design's
/// error-handling rules: the table stays at its current size and the
/// caller is told so via [`TableError::Resize`].
const PRIMES: &[usize] = &[
    53, 97, 193, 389, 769, 1_543, 3_079, 6_151, 12_289, 24_593, 49_157, 98_317, 196_613, 393_241,
    786_433, 1_572_869, 3_145_739, 6_291_469, 12_582_917, 25_165_843, 50_331_653, 100_663_319,
    201_326_611, 402_653_189, 805_306_457, 1_610_612_741,
];

/// Histogram cap: counts at or above this value are folded into a single
/// overflow bucket (index `HISTOGRAM_CAP`).
const HISTOGRAM_CAP: usize = 1025;

/// Finalizer from MurmurHash3's 64-bit mix, used to spread packed k-mer
/// values (which are top-aligned and so not uniform in their low bits)
/// across buckets. The key is "its integer value" per the table's hashing
/// contract; this is the "stronger integer mixer" a strict implementation
/// may substitute.
fn mix(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

/// A chained hash table mapping packed k-mers to abundance counts.
#[derive(Debug, Clone)]
pub struct KmerTable {
    buckets: Vec<Vec<(u64, u32)>>,
    prime_idx: usize,
    entries: usize,
}

impl Default for KmerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl KmerTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); PRIMES[0]],
            prime_idx: 0,
            entries: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index(&self, kmer: u64) -> usize {
        (mix(kmer) % self.buckets.len() as u64) as usize
    }

    /// Raw lookup: 0 means the k-mer was never recorded (or was pruned as a
    /// singleton during preprocessing).
    #[must_use]
    pub fn get_raw(&self, kmer: u64) -> u32 {
        let idx = self.bucket_index(kmer);
        self.buckets[idx]
            .iter()
            .find(|&&(k, _)| k == kmer)
            .map_or(0, |&(_, count)| count)
    }

    /// Wrapped lookup used by the correction engine's count arrays: a
    /// missing key reads as count 1, collapsing "pruned singleton" and
    /// "never seen" into the same "as rare as possible" meaning.
    #[must_use]
    pub fn lookup(&self, kmer: u64) -> u32 {
        match self.get_raw(kmer) {
            0 => 1,
            count => count,
        }
    }

    /// Increments the count for `kmer`, inserting it at count 1 if absent.
    /// Returns an error (and leaves the table unchanged) only if the table
    /// is already at its largest configured bucket size and would need to
    /// grow to stay within its load-factor target; in that case the table
    /// keeps operating at its current size, degraded but correct.
    pub fn increment(&mut self, kmer: u64) -> Result<(), TableError> {
        let idx = self.bucket_index(kmer);
        if let Some(entry) = self.buckets[idx].iter_mut().find(|(k, _)| *k == kmer) {
            entry.1 += 1;
        } else {
            self.buckets[idx].push((kmer, 1));
            self.entries += 1;
            self.maybe_grow()?;
        }
        Ok(())
    }

    fn remove(&mut self, kmer: u64) {
        let idx = self.bucket_index(kmer);
        if let Some(pos) = self.buckets[idx].iter().position(|&(k, _)| k == kmer) {
            self.buckets[idx].swap_remove(pos);
            self.entries -= 1;
        }
    }

    fn maybe_grow(&mut self) -> Result<(), TableError> {
        if self.entries > self.buckets.len() / 2 {
            self.resize(self.prime_idx + 1)?;
        }
        Ok(())
    }

    fn maybe_shrink(&mut self) {
        if self.prime_idx > 0 && self.entries <= self.buckets.len() / 8 {
            // Shrinking always fits in a smaller prime already proven
            // allocatable (we just came from it), so this cannot fail.
            let _ = self.resize(self.prime_idx - 1);
        }
    }

    fn resize(&mut self, new_idx: usize) -> Result<(), TableError> {
        let Some(&new_size) = PRIMES.get(new_idx) else {
            return Err(TableError::Resize {
                attempted_buckets: self.buckets.len() * 2,
                current_buckets: self.buckets.len(),
            });
        };

        let mut new_buckets = vec![Vec::new(); new_size];
        for bucket in self.buckets.drain(..) {
            for (kmer, count) in bucket {
                let idx = (mix(kmer) % new_size as u64) as usize;
                new_buckets[idx].push((kmer, count));
            }
        }
        self.buckets = new_buckets;
        self.prime_idx = new_idx;
        Ok(())
    }

    /// Iterates over every `(kmer, count)` entry currently in the table, in
    /// no particular order. Used by index serialization.
    pub fn entries(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.buckets.iter().flatten().copied()
    }

    /// Inserts a `(kmer, count)` pair directly, bypassing the usual
    /// increment-by-one path. Used when restoring a table from a saved
    /// index, where counts are already known.
    pub fn insert_raw(&mut self, kmer: u64, count: u32) {
        let idx = self.bucket_index(kmer);
        self.buckets[idx].push((kmer, count));
        self.entries += 1;
        let _ = self.maybe_grow();
    }

    /// Feeds every k-mer of `seq` and of its reverse complement into the
    /// table, per the build-phase contract: forward and reverse-complement
    /// k-mers are added independently, not canonicalized into one key.
    ///
    /// A resize failure partway through a sequence is logged and the build
    /// continues at the current table size; it never aborts the batch.
    pub fn add_sequence(&mut self, seq: &PackedSequence, k: usize) {
        self.add_strand(seq, k);
        let rc = seq.reverse_complement();
        self.add_strand(&rc, k);
    }

    fn add_strand(&mut self, seq: &PackedSequence, k: usize) {
        let len = seq.len();
        if len < k {
            return;
        }
        for i in 0..=(len - k) {
            let kmer = seq.get_kmer(i, i + k);
            if let Err(err) = self.increment(kmer) {
                #[cfg(feature = "tracing")]
                tracing::warn!(%err, "k-mer table resize failed, continuing at current capacity");
                #[cfg(not(feature = "tracing"))]
                eprintln!("warning: {err}");
            }
        }
    }

    /// Removes every k-mer with count exactly 1, shrinks the table if the
    /// resulting load factor warrants it, and infers the low-coverage
    /// threshold from the (pre-removal) count histogram.
    pub fn preprocess(&mut self) -> PreprocessReport {
        let mut histogram = vec![0u64; HISTOGRAM_CAP + 1];
        let mut singleton_keys = Vec::new();

        for bucket in &self.buckets {
            for &(kmer, count) in bucket {
                let slot = (count as usize).min(HISTOGRAM_CAP);
                histogram[slot] += 1;
                if count == 1 {
                    singleton_keys.push(kmer);
                }
            }
        }

        let singletons_removed = singleton_keys.len() as u64;
        for kmer in singleton_keys {
            self.remove(kmer);
        }
        self.maybe_shrink();

        let low_kmer_threshold = infer_low_kmer_threshold(&histogram);

        PreprocessReport {
            histogram,
            singletons_removed,
            low_kmer_threshold,
        }
    }
}

/// Result of a [`KmerTable::preprocess`] pass.
#[derive(Debug, Clone)]
pub struct PreprocessReport {
    /// `histogram[c]` is the number of distinct k-mers that had count `c`
    /// before singleton removal; index `HISTOGRAM_CAP` is an overflow
    /// bucket for counts at or above that value.
    pub histogram: Vec<u64>,
    /// Number of singleton k-mers removed.
    pub singletons_removed: u64,
    /// The inferred low-coverage threshold: starting at `c = 1`, advance
    /// while `histogram[c] > histogram[c+1]` and stop at the first ascent or
    /// plateau, i.e. the bottom of the descending run starting at the
    /// singleton-noise peak. If the histogram never stops descending before
    /// `HISTOGRAM_CAP`, this reaches `HISTOGRAM_CAP`, which downstream
    /// predicates should treat as "no k-mer count in this read could ever
    /// exceed the threshold" rather than as a literal count.
    pub low_kmer_threshold: usize,
}

fn infer_low_kmer_threshold(histogram: &[u64]) -> usize {
    let mut c = 1;
    while c < HISTOGRAM_CAP && histogram[c] > histogram[c + 1] {
        c += 1;
    }
    c
}
