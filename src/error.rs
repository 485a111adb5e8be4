//! Error types for pollux-rs.
//!
//! This module provides exhaustive, strongly-typed errors for all operations
//! in the library, enabling precise error handling and informative messages.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level errors surfaced by the CLI and pipeline driver.
#[derive(Debug, Error)]
pub enum PolluxError {
    /// Argument validation failed before any work began.
    #[error("{0}")]
    Args(String),

    /// Failed to open or read an input file.
    #[error("failed to read '{path}': {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// A FASTQ record was malformed or truncated.
    #[error("malformed FASTQ record in '{path}' at line {line}: {details}")]
    Fastq {
        details: String,
        path: PathBuf,
        line: usize,
    },

    /// K-mer table construction or lookup failed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// K-mer index file I/O failed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Failed to write an output file.
    #[error("failed to write '{path}': {source}")]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Errors internal to the k-mer table's hash table implementation.
///
/// Per the design's error-handling rules, a [`TableError::Resize`] is a
/// *recovered* condition: the table reverts to its pre-resize capacity and
/// continues operating rather than propagating failure to the caller. The
/// variant exists so the recovery path has something concrete to log.
#[derive(Debug, Error)]
pub enum TableError {
    /// A resize operation could not allocate the larger (or smaller) bucket
    /// array; the table keeps its previous size.
    #[error(
        "k-mer table resize to {attempted_buckets} buckets failed, keeping {current_buckets} buckets"
    )]
    Resize {
        attempted_buckets: usize,
        current_buckets: usize,
    },
}

/// Errors for invalid or corrupted k-mer index files.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Failed to open/create the index file.
    #[error("failed to access index file '{path}': {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// The file is not a recognizable pollux-rs index.
    #[error("invalid index file '{path}': {details}")]
    Invalid { details: String, path: PathBuf },
}

/// Error for a k-mer length outside the supported range.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("k-mer length {k} is out of range: must be between {min} and {max}")]
pub struct KmerLengthError {
    /// The invalid value that was provided.
    pub k: usize,
    /// Minimum valid k-mer length.
    pub min: u8,
    /// Maximum valid k-mer length.
    pub max: u8,
}

impl From<KmerLengthError> for PolluxError {
    fn from(err: KmerLengthError) -> Self {
        PolluxError::Args(err.to_string())
    }
}
