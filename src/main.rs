#![allow(clippy::too_many_lines)]

use std::process;

use clap::Parser;
use colored::Colorize;
use pollux_rs::cli::{Cli, Command};
use pollux_rs::config::RunConfig;
use pollux_rs::pipeline;

/// Set `RUST_LOG=pollux_rs=debug` to see debug output.
#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

fn main() {
    #[cfg(feature = "tracing")]
    init_tracing();

    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Command::BuildIndex(args)) => {
            pipeline::run_build_index(&args.inputs, args.k, &args.output).map_err(|e| e.to_string())
        }
        Some(Command::Histogram(args)) => {
            pipeline::run_histogram(&args.inputs, args.k).map_err(|e| e.to_string())
        }
        None => run_correct(&cli),
    };

    if let Err(message) = result {
        eprintln!("{} {}", "error:".red().bold(), message);
        process::exit(1);
    }
}

fn run_correct(cli: &Cli) -> Result<(), String> {
    let config = RunConfig::from_args(&cli.correct).map_err(|e| e.to_string())?;

    println!(
        "{} k={} paired={} inputs={}",
        "pollux-rs:".bold(),
        config.correction.k.get().to_string().blue(),
        config.paired.to_string().blue(),
        config
            .inputs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
            .blue()
    );
    println!(
        "{} substitutions={} insertions={} deletions={} homopolymers={} filtering={}",
        "pollux-rs:".bold(),
        config.correction.substitutions,
        config.correction.insertions,
        config.correction.deletions,
        config.correction.homopolymers,
        config.correction.filtering
    );

    pipeline::run(&config).map_err(|e| e.to_string())
}
