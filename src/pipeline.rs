//! Pipeline driver: builds the k-mer table from inputs, then applies the
//! correction engine read-by-read; for paired inputs, coordinates the two
//! streams by read ordinal.
//!
//! Grounded on `original_source/source/ErrorProcessing.c`'s per-file build
//! loop and the paired-orphan merge policy it implements, reworked around
//! this crate's batch reader and `Statistics` value type (spec.md §9's
//! "replace global accumulators" note).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::config::RunConfig;
use crate::correction::{correct_read, CorrectionConfig};
use crate::error::PolluxError;
use crate::fastk::write_fastk_record;
use crate::fastq::{write_record, BatchReader, FastqReader};
use crate::index::{load_index, save_index};
use crate::progress::ProgressTracker;
use crate::record::{ReadRecord, ReadTag};
use crate::stats::Statistics;
use crate::table::KmerTable;

/// A source of FASTQ records, abstracting over the concrete reader so the
/// paired-correction merge logic can be driven by a real file reader in
/// production and by a fixed sequence of records (with hand-picked
/// ordinals) in tests.
trait RecordSource {
    fn next(&mut self) -> Result<Option<ReadRecord>, PolluxError>;
}

impl<R: std::io::BufRead> RecordSource for FastqReader<R> {
    fn next(&mut self) -> Result<Option<ReadRecord>, PolluxError> {
        self.next_record()
    }
}

fn open_reader(path: &Path) -> Result<FastqReader<BufReader<File>>, PolluxError> {
    let file = File::open(path).map_err(|source| PolluxError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    Ok(FastqReader::new(BufReader::new(file), path))
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, PolluxError> {
    let file = File::create(path).map_err(|source| PolluxError::Write {
        source,
        path: path.to_path_buf(),
    })?;
    Ok(BufWriter::new(file))
}

fn basename(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Builds the k-mer table from every input file, running `preprocess` after
/// each file so the coverage threshold self-adjusts as more data arrives.
/// Returns the table and the threshold inferred from the *last* file's
/// preprocess pass, per spec.md §4.5.
pub fn build_table(
    inputs: &[PathBuf],
    k: usize,
    batch_size: usize,
    progress: &ProgressTracker,
) -> Result<(KmerTable, usize), PolluxError> {
    let mut table = KmerTable::new();
    let mut low_kmer_threshold = 0;

    for path in inputs {
        let reader = open_reader(path)?;
        let mut batches = BatchReader::new(reader, batch_size);

        loop {
            let batch = batches.next_batch()?;
            if batch.is_empty() {
                break;
            }
            let base_count: u64 = batch.iter().map(|r| r.len() as u64).sum();

            #[cfg(feature = "rayon")]
            {
                use rayon::prelude::*;
                // The build phase's table is shared mutable state, so each
                // batch first counts k-mers per read in parallel, then folds
                // the per-read tallies into the table sequentially. This
                // keeps the table itself single-writer while still
                // parallelizing the read-only counting work across cores.
                let per_read: Vec<Vec<u64>> = batch
                    .par_iter()
                    .map(|record| collect_kmers(record, k))
                    .collect();
                for kmers in per_read {
                    for kmer in kmers {
                        if let Err(err) = table.increment(kmer) {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(%err, "resize failed during build");
                            #[cfg(not(feature = "tracing"))]
                            eprintln!("warning: {err}");
                        }
                    }
                }
            }
            #[cfg(not(feature = "rayon"))]
            {
                for record in &batch {
                    table.add_sequence(&record.sequence, k);
                }
            }

            progress.record_batch(batch.len() as u64, base_count);
        }

        let report = table.preprocess();
        low_kmer_threshold = report.low_kmer_threshold;

        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %path.display(),
            unique_kmers = table.len(),
            threshold = low_kmer_threshold,
            "preprocessed k-mer table after file"
        );
    }

    Ok((table, low_kmer_threshold))
}

#[cfg(feature = "rayon")]
fn collect_kmers(record: &ReadRecord, k: usize) -> Vec<u64> {
    let len = record.sequence.len();
    if len < k {
        return Vec::new();
    }
    let mut kmers = Vec::with_capacity(2 * (len - k + 1));
    for i in 0..=(len - k) {
        kmers.push(record.sequence.get_kmer(i, i + k));
    }
    let rc = record.sequence.reverse_complement();
    for i in 0..=(len - k) {
        kmers.push(rc.get_kmer(i, i + k));
    }
    kmers
}

/// Loads a table via `--load-index`, or builds one fresh from `config`'s
/// inputs. Emits the per-run banner either way.
pub fn prepare_table(
    config: &RunConfig,
    progress: &ProgressTracker,
) -> Result<(KmerTable, usize), PolluxError> {
    if let Some(index_path) = &config.load_index {
        println!(
            "{} loading index from {}",
            "pollux-rs:".bold(),
            index_path.display()
        );
        return load_index(index_path).map_err(PolluxError::from);
    }

    println!(
        "{} building k-mer table (k={}) from {} input file(s)",
        "pollux-rs:".bold(),
        config.correction.k.get(),
        config.inputs.len()
    );
    build_table(
        &config.inputs,
        config.correction.k.get(),
        config.batch_size,
        progress,
    )
}

/// Runs the `build-index` subcommand: build + preprocess only, then save.
pub fn run_build_index(
    inputs: &[PathBuf],
    k: usize,
    output: &Path,
) -> Result<(), PolluxError> {
    let progress = ProgressTracker::new();
    let (table, threshold) = build_table(inputs, k, crate::fastq::DEFAULT_BATCH_SIZE, &progress)?;
    save_index(&table, k as u8, threshold, output)?;
    println!(
        "{} wrote index with {} k-mers (threshold={}) to {}",
        "pollux-rs:".bold(),
        table.len(),
        threshold,
        output.display()
    );
    Ok(())
}

/// Runs the `histogram` subcommand: build + preprocess, then print `H[c]`.
pub fn run_histogram(inputs: &[PathBuf], k: usize) -> Result<(), PolluxError> {
    let mut table = KmerTable::new();
    for path in inputs {
        let reader = open_reader(path)?;
        let mut batches = BatchReader::new(reader, crate::fastq::DEFAULT_BATCH_SIZE);
        loop {
            let batch = batches.next_batch()?;
            if batch.is_empty() {
                break;
            }
            for record in &batch {
                table.add_sequence(&record.sequence, k);
            }
        }
    }
    let report = table.preprocess();
    for (count, tally) in report.histogram.iter().enumerate() {
        if *tally > 0 {
            println!("{count}\t{tally}");
        }
    }
    println!(
        "{} low_kmer_threshold = {}",
        "pollux-rs:".bold(),
        report.low_kmer_threshold
    );
    Ok(())
}

fn print_statistics(label: &str, stats: &Statistics) {
    println!(
        "{} {}: substitutions={} insertions={} deletions={} homopolymers={} total={}",
        "pollux-rs:".bold(),
        label,
        stats.substitutions,
        stats.insertions,
        stats.deletions,
        stats.homopolymers,
        stats.total_corrections()
    );
}

/// Runs FASTK-conversion mode for one input: emits a `.fastk`-suffixed file
/// of six-line FASTK records instead of correcting.
fn run_fastk_for_file(
    path: &Path,
    table: &KmerTable,
    k: usize,
    output_dir: &Path,
) -> Result<(), PolluxError> {
    let mut reader = open_reader(path)?;
    let out_path = output_dir.join(format!("{}.fastk", basename(path)));
    let mut writer = create_writer(&out_path)?;

    while let Some(record) = reader.next_record()? {
        write_fastk_record(&mut writer, &record, table, k).map_err(|source| {
            PolluxError::Write {
                source,
                path: out_path.clone(),
            }
        })?;
    }
    Ok(())
}

/// Runs single-input correction: stream, correct, write survivors to
/// `<basename>.corrected` and Bad-tagged reads to `<basename>.low` when
/// filtering is enabled.
fn run_single_correction(
    path: &Path,
    table: &KmerTable,
    low_kmer_threshold: usize,
    config: &CorrectionConfig,
    output_dir: &Path,
) -> Result<Statistics, PolluxError> {
    let mut reader = open_reader(path)?;
    let name = basename(path);
    let corrected_path = output_dir.join(format!("{name}.corrected"));
    let mut corrected_writer = create_writer(&corrected_path)?;

    let low_path = output_dir.join(format!("{name}.low"));
    let mut low_writer = if config.filtering {
        Some(create_writer(&low_path)?)
    } else {
        None
    };

    let mut stats = Statistics::new();
    while let Some(mut record) = reader.next_record()? {
        let read_stats = correct_read(&mut record, table, config, low_kmer_threshold);
        stats.merge(&read_stats);

        let to_low = config.filtering && record.tag == ReadTag::Bad;
        if to_low {
            write_record(low_writer.as_mut().unwrap(), &record).map_err(write_err)?;
        } else {
            write_record(&mut corrected_writer, &record).map_err(write_err)?;
        }
    }

    print_statistics(&name, &stats);
    Ok(stats)
}

/// Runs paired correction: advances both streams in lock-step by ordinal,
/// writing matched pairs to their own corrected/low files and routing
/// orphans (the lower-ordinal side of a mismatch) to a shared
/// `extra.corrected` file, preserving output alignment.
fn run_paired_correction(
    left_path: &Path,
    right_path: &Path,
    table: &KmerTable,
    low_kmer_threshold: usize,
    config: &CorrectionConfig,
    output_dir: &Path,
) -> Result<Statistics, PolluxError> {
    let mut left_reader = open_reader(left_path)?;
    let mut right_reader = open_reader(right_path)?;

    let left_name = basename(left_path);
    let right_name = basename(right_path);

    let mut left_corrected = create_writer(&output_dir.join(format!("{left_name}.corrected")))?;
    let mut right_corrected = create_writer(&output_dir.join(format!("{right_name}.corrected")))?;
    let mut left_low = if config.filtering {
        Some(create_writer(&output_dir.join(format!("{left_name}.low")))?)
    } else {
        None
    };
    let mut right_low = if config.filtering {
        Some(create_writer(&output_dir.join(format!("{right_name}.low")))?)
    } else {
        None
    };
    let mut extra = create_writer(&output_dir.join("extra.corrected"))?;

    let stats = correct_paired_streams(
        &mut left_reader,
        &mut right_reader,
        table,
        low_kmer_threshold,
        config,
        &mut left_corrected,
        &mut right_corrected,
        left_low.as_mut(),
        right_low.as_mut(),
        &mut extra,
    )?;

    print_statistics(&format!("{left_name}+{right_name}"), &stats);
    Ok(stats)
}

/// Core paired-correction merge: advances both record sources in lock-step
/// by ordinal. Generic over the record source and writer so it can be
/// driven directly by hand-picked ordinals in tests, independent of how a
/// real FASTQ file happens to assign them.
#[allow(clippy::too_many_arguments)]
fn correct_paired_streams<LS, RS, W>(
    left: &mut LS,
    right: &mut RS,
    table: &KmerTable,
    low_kmer_threshold: usize,
    config: &CorrectionConfig,
    left_corrected: &mut W,
    right_corrected: &mut W,
    mut left_low: Option<&mut W>,
    mut right_low: Option<&mut W>,
    extra: &mut W,
) -> Result<Statistics, PolluxError>
where
    LS: RecordSource,
    RS: RecordSource,
    W: Write,
{
    let mut stats = Statistics::new();
    let mut left_rec = left.next()?;
    let mut right_rec = right.next()?;

    loop {
        match (&mut left_rec, &mut right_rec) {
            (Some(l), Some(r)) => {
                if l.ordinal == r.ordinal {
                    let ls = correct_read(l, table, config, low_kmer_threshold);
                    let rs = correct_read(r, table, config, low_kmer_threshold);
                    stats.merge(&ls);
                    stats.merge(&rs);

                    let both_bad = config.filtering
                        && l.tag == ReadTag::Bad
                        && r.tag == ReadTag::Bad;
                    if both_bad {
                        write_record(left_low.as_mut().unwrap(), l).map_err(write_err)?;
                        write_record(right_low.as_mut().unwrap(), r).map_err(write_err)?;
                    } else {
                        write_record(left_corrected, l).map_err(write_err)?;
                        write_record(right_corrected, r).map_err(write_err)?;
                    }
                    left_rec = left.next()?;
                    right_rec = right.next()?;
                } else if l.ordinal < r.ordinal {
                    let s = correct_read(l, table, config, low_kmer_threshold);
                    stats.merge(&s);
                    write_record(extra, l).map_err(write_err)?;
                    left_rec = left.next()?;
                } else {
                    let s = correct_read(r, table, config, low_kmer_threshold);
                    stats.merge(&s);
                    write_record(extra, r).map_err(write_err)?;
                    right_rec = right.next()?;
                }
            }
            (Some(l), None) => {
                let s = correct_read(l, table, config, low_kmer_threshold);
                stats.merge(&s);
                write_record(extra, l).map_err(write_err)?;
                left_rec = left.next()?;
            }
            (None, Some(r)) => {
                let s = correct_read(r, table, config, low_kmer_threshold);
                stats.merge(&s);
                write_record(extra, r).map_err(write_err)?;
                right_rec = right.next()?;
            }
            (None, None) => break,
        }
    }

    Ok(stats)
}

fn write_err(source: std::io::Error) -> PolluxError {
    PolluxError::Write {
        source,
        path: PathBuf::from("<output stream>"),
    }
}

/// Top-level entry point for the `correct` pipeline (the no-subcommand
/// default), dispatching to FASTK, paired, or single-file correction per
/// `config`.
pub fn run(config: &RunConfig) -> Result<(), PolluxError> {
    let progress = ProgressTracker::new();
    let (table, low_kmer_threshold) = prepare_table(config, &progress)?;

    if config.fastk {
        for path in &config.inputs {
            run_fastk_for_file(path, &table, config.correction.k.get(), &config.output_dir)?;
        }
        return Ok(());
    }

    if config.paired {
        run_paired_correction(
            &config.inputs[0],
            &config.inputs[1],
            &table,
            low_kmer_threshold,
            &config.correction,
            &config.output_dir,
        )?;
    } else {
        for path in &config.inputs {
            run_single_correction(
                path,
                &table,
                low_kmer_threshold,
                &config.correction,
                &config.output_dir,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer::KmerLength;
    use tempfile::TempDir;

    fn write_fastq(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn config(inputs: Vec<PathBuf>, output_dir: PathBuf, paired: bool) -> RunConfig {
        RunConfig {
            inputs,
            output_dir,
            paired,
            batch_size: 100,
            fastk: false,
            load_index: None,
            correction: CorrectionConfig {
                k: KmerLength::new(5).unwrap(),
                substitutions: true,
                insertions: true,
                deletions: true,
                homopolymers: true,
                filtering: true,
            },
        }
    }

    #[test]
    fn single_file_pipeline_writes_corrected_output() {
        let dir = TempDir::new().unwrap();
        let reference = "AAAAACCCCCGGGGGTTTTT";
        let data = format!("@r1\n{reference}\n+\n{}\n", "I".repeat(reference.len()));
        let input = write_fastq(dir.path(), "reads.fastq", &data);

        let cfg = config(vec![input], dir.path().to_path_buf(), false);
        run(&cfg).unwrap();

        let corrected = std::fs::read_to_string(dir.path().join("reads.corrected")).unwrap();
        assert!(corrected.contains(reference));
    }

    /// A fixed sequence of already-parsed records, used to drive the merge
    /// logic with hand-picked ordinals independent of how a real FASTQ file
    /// would assign them (file-position order, per `fastq.rs`).
    struct VecSource(std::collections::VecDeque<ReadRecord>);

    impl RecordSource for VecSource {
        fn next(&mut self) -> Result<Option<ReadRecord>, PolluxError> {
            Ok(self.0.pop_front())
        }
    }

    fn labeled_record(label: &str, ordinal: u64, reference: &str) -> ReadRecord {
        ReadRecord::new(
            format!("@{label}"),
            "+".into(),
            seq(reference),
            vec![40; reference.len()],
            ordinal,
        )
    }

    fn seq(s: &str) -> crate::packed::PackedSequence {
        let bases: Vec<crate::packed::Base> =
            s.bytes().map(|b| crate::packed::Base::from_ascii(b).unwrap()).collect();
        crate::packed::PackedSequence::from_bases(&bases)
    }

    /// Matches spec scenario 6 exactly: left ordinals {1,2,4}, right
    /// ordinals {1,3,4}. Expects pairs (1,1) and (4,4) written to their
    /// respective corrected outputs, and L2 then R3 (in that order) routed
    /// to `extra`.
    #[test]
    fn paired_merge_routes_orphans_to_extra_in_ordinal_order() {
        let reference = "AAAAACCCCCGGGGGTTTTT";
        let table = {
            let mut t = KmerTable::new();
            let s = seq(reference);
            for i in 0..=(s.len() - 5) {
                let kmer = s.get_kmer(i, i + 5);
                for _ in 0..10 {
                    t.increment(kmer).unwrap();
                }
            }
            t
        };
        let config = CorrectionConfig {
            k: KmerLength::new(5).unwrap(),
            substitutions: true,
            insertions: true,
            deletions: true,
            homopolymers: true,
            filtering: false,
        };

        let mut left = VecSource(
            vec![
                labeled_record("L1", 1, reference),
                labeled_record("L2", 2, reference),
                labeled_record("L4", 4, reference),
            ]
            .into(),
        );
        let mut right = VecSource(
            vec![
                labeled_record("R1", 1, reference),
                labeled_record("R3", 3, reference),
                labeled_record("R4", 4, reference),
            ]
            .into(),
        );

        let mut left_corrected = Vec::new();
        let mut right_corrected = Vec::new();
        let mut extra = Vec::new();

        correct_paired_streams(
            &mut left,
            &mut right,
            &table,
            2,
            &config,
            &mut left_corrected,
            &mut right_corrected,
            None,
            None,
            &mut extra,
        )
        .unwrap();

        let left_out = String::from_utf8(left_corrected).unwrap();
        let right_out = String::from_utf8(right_corrected).unwrap();
        let extra_out = String::from_utf8(extra).unwrap();

        assert!(left_out.contains("@L1"));
        assert!(left_out.contains("@L4"));
        assert!(!left_out.contains("@L2"));
        assert!(right_out.contains("@R1"));
        assert!(right_out.contains("@R4"));
        assert!(!right_out.contains("@R3"));

        let l2_pos = extra_out.find("@L2").unwrap();
        let r3_pos = extra_out.find("@R3").unwrap();
        assert!(l2_pos < r3_pos, "L2 must precede R3 in extra.corrected");
    }
}
