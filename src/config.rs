//! CLI configuration and validation.
//!
//! This module validates a parsed [`CorrectArgs`] into an immutable
//! [`RunConfig`], the domain value the pipeline driver and correction
//! engine actually consume. Following the teacher's `Config::new` pattern,
//! validation failures are reported as plain, colored, user-facing
//! messages rather than `Debug`-formatted errors.

use std::path::PathBuf;

use colored::Colorize;

use crate::cli::CorrectArgs;
use crate::correction::CorrectionConfig;
use crate::error::PolluxError;
use crate::kmer::KmerLength;

/// Fully validated run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub paired: bool,
    pub batch_size: usize,
    pub fastk: bool,
    pub load_index: Option<PathBuf>,
    pub correction: CorrectionConfig,
}

impl RunConfig {
    /// Validates a parsed [`CorrectArgs`] into a [`RunConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`PolluxError::Args`] if `k` is out of range, no inputs were
    /// given, paired mode was requested with other than exactly two inputs,
    /// or the batch size is zero.
    pub fn from_args(args: &CorrectArgs) -> Result<Self, PolluxError> {
        let k = KmerLength::new(args.k)?;

        if args.inputs.is_empty() {
            return Err(PolluxError::Args(
                "at least one input file is required".red().to_string(),
            ));
        }
        if args.paired && args.inputs.len() != 2 {
            return Err(PolluxError::Args(
                format!(
                    "paired mode requires exactly two input files, got {}",
                    args.inputs.len()
                )
                .red()
                .to_string(),
            ));
        }
        if args.batch_size == 0 {
            return Err(PolluxError::Args(
                "batch size must be greater than zero".red().to_string(),
            ));
        }

        Ok(Self {
            inputs: args.inputs.clone(),
            output_dir: args.output_dir.clone(),
            paired: args.paired,
            batch_size: args.batch_size,
            fastk: args.fastk,
            load_index: args.load_index.clone(),
            correction: CorrectionConfig {
                k,
                substitutions: args.substitutions,
                insertions: args.insertions,
                deletions: args.deletions,
                homopolymers: args.homopolymers,
                filtering: args.filtering,
            },
        })
    }
}
