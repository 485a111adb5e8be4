//! # pollux-rs
//!
//! Corrects sequencing errors in short-read FASTQ datasets using a k-mer
//! frequency model. Given one or more read files, `pollux-rs` builds a
//! global k-mer abundance table across all inputs, then rewrites each read
//! by locating positions where adjacent k-mer counts show a sharp frequency
//! discontinuity and proposing the edit — a substitution, an inserted or
//! deleted base, or a homopolymer-run resize — that most improves the
//! k-mer profile around it.
//!
//! The crate is organized leaves-first, matching the dependency order of
//! its five core components:
//!
//! 1. [`packed`] — 2-bit packed DNA sequences with in-place mutation
//!    primitives.
//! 2. [`table`] — the k-mer abundance hash table, with singleton pruning
//!    and low-coverage threshold inference.
//! 3. [`discontinuity`] — per-position count arrays and the jump predicate
//!    that finds coverage discontinuities.
//! 4. [`correction`] — the per-read edit search, scoring, and commit/revert
//!    engine.
//! 5. [`pipeline`] — the driver that builds the table from inputs and
//!    applies the engine read-by-read, including paired-file coordination.
//!
//! Supporting modules: [`kmer`] (validated k-mer length), [`record`] (read
//! records and the scratch sequence used for trial edits), [`stats`]
//! (per-read and per-file correction statistics), [`fastq`]/[`fastk`]
//! (I/O formats), [`index`] (binary k-mer table persistence), [`progress`]
//! (build-phase progress reporting), [`cli`]/[`config`] (argument parsing
//! and validation), and [`error`] (the crate's error types).

pub mod cli;
pub mod config;
pub mod correction;
pub mod discontinuity;
pub mod error;
pub mod fastk;
pub mod fastq;
pub mod index;
pub mod kmer;
pub mod packed;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod stats;
pub mod table;
