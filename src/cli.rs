//! Command-line interface definition.
//!
//! The default invocation (no subcommand) runs the correct-or-FASTK-convert
//! pipeline with the exact flag surface the tool has always had (`-i`,
//! `-o`, `-p`, `-k`, `-b`, `-s`/`-n`/`-d`/`-h`, `-f`, `-fastk`). Two ambient
//! subcommands, `build-index` and `histogram`, expose the diagnostics
//! tooling without touching that surface.
//!
//! `-h` is spoken for by the homopolymer-correction flag, so the automatic
//! `-h`/`--help` short alias is disabled; `--help` (long form only) still
//! works.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::fastq::DEFAULT_BATCH_SIZE;

fn parse_bool_flag(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("'{s}' is not 'true' or 'false'")),
    }
}

/// Corrects sequencing errors in FASTQ reads using a k-mer frequency model.
#[derive(Parser, Debug)]
#[command(name = "pollux-rs", version, author, about, disable_help_flag = true)]
pub struct Cli {
    #[arg(long, action = ArgAction::Help, help = "Print help")]
    help: Option<bool>,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub correct: CorrectArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and preprocess a k-mer table and save it to a binary index
    /// file, without running correction.
    BuildIndex(BuildIndexArgs),
    /// Print the k-mer count histogram and inferred low-coverage threshold,
    /// without running correction.
    Histogram(HistogramArgs),
}

/// Flags for the default correct/FASTK-convert pipeline.
#[derive(Parser, Debug)]
pub struct CorrectArgs {
    /// One or more input FASTQ paths.
    #[arg(short = 'i', long = "input", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory (default: current working directory).
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Treat the two inputs as a paired set.
    #[arg(short = 'p', long = "paired")]
    pub paired: bool,

    /// K-mer size in [4, 31].
    #[arg(short = 'k', long = "kmer-size", default_value_t = 31)]
    pub k: usize,

    /// Batch size for the streaming reader.
    #[arg(short = 'b', long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Enable substitution corrections.
    #[arg(short = 's', long = "substitutions", value_parser = parse_bool_flag, action = ArgAction::Set, default_value = "true")]
    pub substitutions: bool,

    /// Enable insertion-error corrections (deleting a spuriously inserted base).
    #[arg(short = 'n', long = "insertions", value_parser = parse_bool_flag, action = ArgAction::Set, default_value = "true")]
    pub insertions: bool,

    /// Enable deletion-error corrections (inserting a missing base).
    #[arg(short = 'd', long = "deletions", value_parser = parse_bool_flag, action = ArgAction::Set, default_value = "true")]
    pub deletions: bool,

    /// Enable homopolymer-run resizing.
    #[arg(short = 'h', long = "homopolymers", value_parser = parse_bool_flag, action = ArgAction::Set, default_value = "true")]
    pub homopolymers: bool,

    /// Enable routing Bad-tagged reads to a separate `.low` stream.
    #[arg(short = 'f', long = "filter", value_parser = parse_bool_flag, action = ArgAction::Set, default_value = "true")]
    pub filtering: bool,

    /// Run FASTK-conversion mode instead of correction.
    #[arg(long = "fastk")]
    pub fastk: bool,

    /// Load a previously built index instead of rebuilding the k-mer table.
    #[arg(long = "load-index")]
    pub load_index: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct BuildIndexArgs {
    #[arg(short = 'i', long = "input", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(short = 'k', long = "kmer-size", default_value_t = 31)]
    pub k: usize,

    #[arg(short = 'o', long = "output", required = true)]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
pub struct HistogramArgs {
    #[arg(short = 'i', long = "input", num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(short = 'k', long = "kmer-size", default_value_t = 31)]
    pub k: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_flag_accepts_case_insensitive() {
        assert_eq!(parse_bool_flag("TRUE"), Ok(true));
        assert_eq!(parse_bool_flag("false"), Ok(false));
        assert!(parse_bool_flag("maybe").is_err());
    }

    #[test]
    fn default_correct_invocation_parses() {
        let cli = Cli::try_parse_from(["pollux-rs", "-i", "a.fastq", "-k", "21"]).unwrap();
        assert_eq!(cli.correct.inputs, vec![PathBuf::from("a.fastq")]);
        assert_eq!(cli.correct.k, 21);
        assert!(cli.correct.substitutions);
        assert!(cli.command.is_none());
    }

    #[test]
    fn boolean_flags_accept_explicit_false() {
        let cli =
            Cli::try_parse_from(["pollux-rs", "-i", "a.fastq", "-s", "false", "-h", "false"])
                .unwrap();
        assert!(!cli.correct.substitutions);
        assert!(!cli.correct.homopolymers);
    }

    #[test]
    fn build_index_subcommand_parses() {
        let cli =
            Cli::try_parse_from(["pollux-rs", "build-index", "-i", "a.fastq", "-o", "idx.plxk"])
                .unwrap();
        match cli.command {
            Some(Command::BuildIndex(args)) => {
                assert_eq!(args.output, PathBuf::from("idx.plxk"));
            }
            _ => panic!("expected BuildIndex subcommand"),
        }
    }
}
