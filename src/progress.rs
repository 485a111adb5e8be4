//! Build-phase progress reporting.
//!
//! The pipeline driver calls [`ProgressTracker::record_batch`] once per
//! batch read during the table-build phase, not once per read: per-read
//! callbacks would dominate runtime on large files for no benefit, since
//! the only consumer is a coarse-grained status line.

use std::sync::atomic::{AtomicU64, Ordering};

/// A progress snapshot taken after a batch has been folded into the table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    /// Number of batches processed so far.
    pub batches_processed: u64,
    /// Number of reads processed so far.
    pub reads_processed: u64,
    /// Total number of bases processed so far.
    pub bases_processed: u64,
}

/// Thread-safe accumulator for build-phase progress.
///
/// Kept atomic (rather than a plain struct behind a mutex) so the pipeline
/// driver's rayon-parallel counting stage can record batches from multiple
/// worker threads without contention.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    batches: AtomicU64,
    reads: AtomicU64,
    bases: AtomicU64,
}

impl ProgressTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batches: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            bases: AtomicU64::new(0),
        }
    }

    /// Records that one batch of `read_count` reads totaling `base_count`
    /// bases has been folded into the table.
    pub fn record_batch(&self, read_count: u64, base_count: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.reads.fetch_add(read_count, Ordering::Relaxed);
        self.bases.fetch_add(base_count, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> Progress {
        Progress {
            batches_processed: self.batches.load(Ordering::Relaxed),
            reads_processed: self.reads.load(Ordering::Relaxed),
            bases_processed: self.bases.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.batches.store(0, Ordering::Relaxed);
        self.reads.store(0, Ordering::Relaxed);
        self.bases.store(0, Ordering::Relaxed);
    }
}
