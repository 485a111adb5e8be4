//! FASTQ record parsing, batching, and writing.
//!
//! Four ASCII lines per record: header (`@...`), sequence, separator
//! (`+...`), quality (Phred-33). Leading/trailing whitespace and
//! leading/trailing runs of `N` are trimmed from the sequence (and the
//! matching quality bytes) before encoding; internal `N`s are replaced
//! deterministically rather than rejected, so every record can be packed.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::PolluxError;
use crate::packed::{Base, PackedSequence};
use crate::record::ReadRecord;

/// Per spec.md §6: records are capped at this many bytes per line.
pub const MAX_LINE_BYTES: usize = 2048;

/// Default number of reads pulled into memory per batch, matching the
/// pipeline driver's default `-b` value.
pub const DEFAULT_BATCH_SIZE: usize = 200_000;

fn check_line_length(line: &str, path: &Path, file_line: usize) -> Result<(), PolluxError> {
    if line.len() > MAX_LINE_BYTES {
        return Err(PolluxError::Fastq {
            details: format!("line exceeds {MAX_LINE_BYTES} bytes"),
            path: path.to_path_buf(),
            line: file_line,
        });
    }
    Ok(())
}

/// Trims leading/trailing whitespace, then leading/trailing `N`/`n` runs,
/// from `sequence`, applying the same index range to `quality` (the two
/// lines are equal length once whitespace is stripped). Internal `N`s are
/// left in place for the caller to replace via rotation.
fn trim_sequence(sequence: &str, quality: &str) -> (String, String) {
    let seq_bytes = sequence.trim().as_bytes();
    let quality_bytes = quality.trim().as_bytes();

    let mut start = 0;
    while start < seq_bytes.len() && matches!(seq_bytes[start], b'N' | b'n') {
        start += 1;
    }
    let mut end = seq_bytes.len();
    while end > start && matches!(seq_bytes[end - 1], b'N' | b'n') {
        end -= 1;
    }

    let trimmed_seq = std::str::from_utf8(&seq_bytes[start..end]).unwrap_or("");
    let q_end = end.min(quality_bytes.len());
    let q_start = start.min(q_end);
    let trimmed_quality = std::str::from_utf8(&quality_bytes[q_start..q_end]).unwrap_or("");
    (trimmed_seq.to_string(), trimmed_quality.to_string())
}

/// Encodes a trimmed sequence string into bases, replacing any remaining
/// internal `N`/`n` by cycling deterministically through A/C/G/T.
fn encode_with_rotation(sequence: &str) -> Vec<Base> {
    let mut rotation = Base::A;
    sequence
        .bytes()
        .map(|b| match Base::from_ascii(b) {
            Some(base) => base,
            None => {
                let replacement = rotation;
                rotation = rotation.next_in_rotation();
                replacement
            }
        })
        .collect()
}

/// Streams FASTQ records one at a time from a buffered reader, assigning
/// 1-based ordinals in file order.
pub struct FastqReader<R> {
    inner: R,
    path: std::path::PathBuf,
    file_line: usize,
    next_ordinal: u64,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(inner: R, path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            file_line: 0,
            next_ordinal: 1,
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, PolluxError> {
        let mut buf = String::new();
        let bytes = self
            .inner
            .read_line(&mut buf)
            .map_err(|source| PolluxError::Io {
                source,
                path: self.path.clone(),
            })?;
        if bytes == 0 {
            return Ok(None);
        }
        self.file_line += 1;
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        check_line_length(&buf, &self.path, self.file_line)?;
        Ok(Some(buf))
    }

    /// Reads the next record, or `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<ReadRecord>, PolluxError> {
        let Some(header) = self.read_line()? else {
            return Ok(None);
        };
        if !header.starts_with('@') {
            return Err(PolluxError::Fastq {
                details: "header line must start with '@'".into(),
                path: self.path.clone(),
                line: self.file_line,
            });
        }

        let sequence_line =
            self.read_line()?
                .ok_or_else(|| PolluxError::Fastq {
                    details: "truncated record: missing sequence line".into(),
                    path: self.path.clone(),
                    line: self.file_line,
                })?;

        let separator =
            self.read_line()?
                .ok_or_else(|| PolluxError::Fastq {
                    details: "truncated record: missing separator line".into(),
                    path: self.path.clone(),
                    line: self.file_line,
                })?;
        if !separator.starts_with('+') {
            return Err(PolluxError::Fastq {
                details: "separator line must start with '+'".into(),
                path: self.path.clone(),
                line: self.file_line,
            });
        }

        let quality_line =
            self.read_line()?
                .ok_or_else(|| PolluxError::Fastq {
                    details: "truncated record: missing quality line".into(),
                    path: self.path.clone(),
                    line: self.file_line,
                })?;

        let (trimmed_seq, trimmed_quality) = trim_sequence(&sequence_line, &quality_line);
        if trimmed_seq.len() != trimmed_quality.len() {
            return Err(PolluxError::Fastq {
                details: "sequence and quality lengths differ after trimming".into(),
                path: self.path.clone(),
                line: self.file_line,
            });
        }

        let bases = encode_with_rotation(&trimmed_seq);
        let sequence = PackedSequence::from_bases(&bases);
        let quality = trimmed_quality.into_bytes();

        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        Ok(Some(ReadRecord::new(
            header, separator, sequence, quality, ordinal,
        )))
    }
}

/// Pulls records from a [`FastqReader`] in bounded-size batches, so the
/// correction loop never holds more than `batch_size` reads in memory at
/// once.
pub struct BatchReader<R> {
    reader: FastqReader<R>,
    batch_size: usize,
}

impl<R: BufRead> BatchReader<R> {
    #[must_use]
    pub fn new(reader: FastqReader<R>, batch_size: usize) -> Self {
        Self {
            reader,
            batch_size: batch_size.max(1),
        }
    }

    /// Reads up to `batch_size` records. Returns an empty vector at end of
    /// file.
    pub fn next_batch(&mut self) -> Result<Vec<ReadRecord>, PolluxError> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.reader.next_record()? {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// Writes a record in FASTQ's four-line format. Headers and separators are
/// passed through verbatim.
pub fn write_record(writer: &mut impl Write, record: &ReadRecord) -> std::io::Result<()> {
    writeln!(writer, "{}", record.header)?;
    for pos in 0..record.sequence.len() {
        write!(writer, "{}", record.sequence.get_base(pos).to_ascii() as char)?;
    }
    writeln!(writer)?;
    writeln!(writer, "{}", record.separator)?;
    writer.write_all(&record.quality)?;
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_single_record() {
        let data = "@r1\nACGT\n+\nIIII\n";
        let mut reader = FastqReader::new(Cursor::new(data), "test.fastq");
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.header, "@r1");
        assert_eq!(record.len(), 4);
        assert_eq!(record.ordinal, 1);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn assigns_sequential_ordinals() {
        let data = "@r1\nACGT\n+\nIIII\n@r2\nTTTT\n+\nIIII\n";
        let mut reader = FastqReader::new(Cursor::new(data), "test.fastq");
        let r1 = reader.next_record().unwrap().unwrap();
        let r2 = reader.next_record().unwrap().unwrap();
        assert_eq!(r1.ordinal, 1);
        assert_eq!(r2.ordinal, 2);
    }

    #[test]
    fn trims_leading_and_trailing_n_runs() {
        let data = "@r1\nNNACGTNN\n+\n##IIII##\n";
        let mut reader = FastqReader::new(Cursor::new(data), "test.fastq");
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.len(), 4);
        for (i, expected) in "ACGT".bytes().enumerate() {
            assert_eq!(record.sequence.get_base(i).to_ascii(), expected);
        }
        assert_eq!(record.quality, b"IIII");
    }

    #[test]
    fn replaces_internal_n_deterministically() {
        let data = "@r1\nACNNGT\n+\nIIIIII\n";
        let mut reader = FastqReader::new(Cursor::new(data), "test.fastq");
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.len(), 6);
        // positions 2,3 were N -> rotation starts at A and advances per
        // replacement, independent of earlier real bases.
        assert_eq!(record.sequence.get_base(2).to_ascii(), b'A');
        assert_eq!(record.sequence.get_base(3).to_ascii(), b'C');
    }

    #[test]
    fn rejects_header_without_at_sign() {
        let data = "r1\nACGT\n+\nIIII\n";
        let mut reader = FastqReader::new(Cursor::new(data), "test.fastq");
        assert!(reader.next_record().is_err());
    }

    #[test]
    fn rejects_truncated_record() {
        let data = "@r1\nACGT\n+\n";
        let mut reader = FastqReader::new(Cursor::new(data), "test.fastq");
        assert!(reader.next_record().is_err());
    }

    #[test]
    fn batch_reader_respects_batch_size() {
        let data = "@r1\nACGT\n+\nIIII\n@r2\nACGT\n+\nIIII\n@r3\nACGT\n+\nIIII\n";
        let reader = FastqReader::new(Cursor::new(data), "test.fastq");
        let mut batches = BatchReader::new(reader, 2);
        let first = batches.next_batch().unwrap();
        assert_eq!(first.len(), 2);
        let second = batches.next_batch().unwrap();
        assert_eq!(second.len(), 1);
        let third = batches.next_batch().unwrap();
        assert!(third.is_empty());
    }

    #[test]
    fn write_record_round_trips_through_reader() {
        let data = "@r1\nACGT\n+\nIIII\n";
        let mut reader = FastqReader::new(Cursor::new(data), "test.fastq");
        let record = reader.next_record().unwrap().unwrap();

        let mut out = Vec::new();
        write_record(&mut out, &record).unwrap();
        assert_eq!(out, b"@r1\nACGT\n+\nIIII\n");
    }
}
