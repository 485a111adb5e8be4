//! FASTK conversion mode: emits raw k-mer counts alongside each read
//! instead of correcting it.
//!
//! Six lines per record: the four FASTQ lines, then a line of
//! space-separated k-mer counts (one per k-mer position, the table's raw
//! lookup including 0 for an absent k-mer), then a blank line. A read
//! shorter than k emits a single `"0"` line in place of the counts line.

use std::io::Write;

use crate::record::ReadRecord;
use crate::table::KmerTable;

/// Writes one record in FASTK format.
pub fn write_fastk_record(
    writer: &mut impl Write,
    record: &ReadRecord,
    table: &KmerTable,
    k: usize,
) -> std::io::Result<()> {
    crate::fastq::write_record(writer, record)?;

    let len = record.sequence.len();
    if len < k {
        writeln!(writer, "0")?;
    } else {
        let counts: Vec<String> = (0..=(len - k))
            .map(|i| table.get_raw(record.sequence.get_kmer(i, i + k)).to_string())
            .collect();
        writeln!(writer, "{}", counts.join(" "))?;
    }
    writeln!(writer)
}
