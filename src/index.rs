//! K-mer table index serialization and deserialization.
//!
//! Lets a `build-index` run persist a preprocessed [`KmerTable`] so later
//! `correct --load-index` runs can skip rebuilding it from raw reads.
//!
//! # Binary format (version 1)
//!
//! ```text
//! +--------+--------+------+-----------+--------+------------------+--------+
//! | MAGIC  | VERSION|  K   | THRESHOLD | COUNT  |      DATA        | CRC32  |
//! | 4 bytes| 1 byte |1 byte|  4 bytes  | 8 bytes| 12 bytes x COUNT | 4 bytes|
//! +--------+--------+------+-----------+--------+------------------+--------+
//!
//! MAGIC:     "PLXK"
//! VERSION:   format version (currently 1)
//! K:         k-mer length (4-31)
//! THRESHOLD: inferred low-coverage threshold (little-endian u32)
//! COUNT:     number of distinct k-mers (little-endian u64)
//! DATA:      (packed_kmer: u64, count: u32) pairs, little-endian
//! CRC32:     checksum (IEEE polynomial) of every preceding byte
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::IndexError;
use crate::table::KmerTable;

const MAGIC: &[u8; 4] = b"PLXK";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 1 + 4 + 8;

#[cfg(feature = "gzip")]
fn is_gzip_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Saves a preprocessed table and its inferred threshold to `path`.
///
/// # Errors
///
/// Returns [`IndexError::Io`] if the file cannot be created or written.
pub fn save_index(table: &KmerTable, k: u8, low_kmer_threshold: usize, path: &Path) -> Result<(), IndexError> {
    #[cfg(feature = "gzip")]
    if is_gzip_path(path) {
        let file = File::create(path).map_err(|source| IndexError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        return write_index(table, k, low_kmer_threshold, BufWriter::new(encoder), path);
    }

    let file = File::create(path).map_err(|source| IndexError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    write_index(table, k, low_kmer_threshold, BufWriter::new(file), path)
}

/// Loads a table and its stored threshold from `path`.
///
/// # Errors
///
/// Returns [`IndexError::Io`] on failed open/read, or [`IndexError::Invalid`]
/// if the magic, version, size, or checksum don't match.
pub fn load_index(path: &Path) -> Result<(KmerTable, usize), IndexError> {
    #[cfg(feature = "gzip")]
    if is_gzip_path(path) {
        let file = File::open(path).map_err(|source| IndexError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        let decoder = flate2::read::GzDecoder::new(file);
        return read_index(BufReader::new(decoder), path);
    }

    let file = File::open(path).map_err(|source| IndexError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    read_index(BufReader::new(file), path)
}

fn write_index<W: Write>(
    table: &KmerTable,
    k: u8,
    low_kmer_threshold: usize,
    mut writer: W,
    path: &Path,
) -> Result<(), IndexError> {
    let entries: Vec<(u64, u32)> = table.entries().collect();

    let mut payload = Vec::with_capacity(HEADER_LEN + entries.len() * 12);
    payload.extend_from_slice(MAGIC);
    payload.push(VERSION);
    payload.push(k);
    payload.extend_from_slice(&(low_kmer_threshold as u32).to_le_bytes());
    payload.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for (kmer, count) in entries {
        payload.extend_from_slice(&kmer.to_le_bytes());
        payload.extend_from_slice(&count.to_le_bytes());
    }

    let checksum = crc32(&payload);
    payload.extend_from_slice(&checksum.to_le_bytes());

    writer.write_all(&payload).map_err(|source| IndexError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    writer.flush().map_err(|source| IndexError::Io {
        source,
        path: path.to_path_buf(),
    })
}

fn read_index<R: Read>(mut reader: R, path: &Path) -> Result<(KmerTable, usize), IndexError> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|source| IndexError::Io {
            source,
            path: path.to_path_buf(),
        })?;

    if data.len() < HEADER_LEN + 4 {
        return Err(IndexError::Invalid {
            details: "file too small".into(),
            path: path.to_path_buf(),
        });
    }
    if &data[..4] != MAGIC {
        return Err(IndexError::Invalid {
            details: "invalid magic bytes (not a pollux-rs index file)".into(),
            path: path.to_path_buf(),
        });
    }

    let (content, checksum_bytes) = data.split_at(data.len() - 4);
    let stored_checksum = u32::from_le_bytes(checksum_bytes.try_into().unwrap());
    let computed_checksum = crc32(content);
    if computed_checksum != stored_checksum {
        return Err(IndexError::Invalid {
            details: format!(
                "checksum mismatch (expected {stored_checksum:#x}, got {computed_checksum:#x})"
            ),
            path: path.to_path_buf(),
        });
    }

    let version = content[4];
    if version != VERSION {
        return Err(IndexError::Invalid {
            details: format!("unsupported version {version}"),
            path: path.to_path_buf(),
        });
    }

    let _k = content[5];
    let threshold = u32::from_le_bytes(content[6..10].try_into().unwrap()) as usize;
    let count = u64::from_le_bytes(content[10..18].try_into().unwrap());

    let expected_len = HEADER_LEN + count as usize * 12;
    if content.len() != expected_len {
        return Err(IndexError::Invalid {
            details: format!(
                "data size mismatch (expected {expected_len} bytes, got {} bytes)",
                content.len()
            ),
            path: path.to_path_buf(),
        });
    }

    let mut table = KmerTable::new();
    let mut cursor = &content[HEADER_LEN..];
    for _ in 0..count {
        let kmer = u64::from_le_bytes(cursor[..8].try_into().unwrap());
        let count = u32::from_le_bytes(cursor[8..12].try_into().unwrap());
        table.insert_raw(kmer, count);
        cursor = &cursor[12..];
    }

    Ok((table, threshold))
}

/// CRC32 (IEEE polynomial), matching the checksum used by gzip and PNG.
fn crc32(data: &[u8]) -> u32 {
    const POLYNOMIAL: u32 = 0xEDB8_8320;

    let table: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ POLYNOMIAL
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = !0u32;
    for &byte in data {
        crc = table[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8);
    }
    !crc
}
