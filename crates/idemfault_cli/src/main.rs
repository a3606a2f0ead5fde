//! IDEMFAULT CLI
//!
//! Idempotency checks over memory-access traces, replay schedules and
//! cross-run output verification.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use console::style;
use idemfault_analyze::{AnalyzerConfig, check_trace, format_addresses};
use idemfault_certify::{HashVerifier, TargetVerdict};
use idemfault_core::Address;
use idemfault_sim::load_replay_sequence;
use idemfault_trace::{TraceReader, section_lengths};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idemfault")]
#[command(about = "IDEMFAULT - idempotency and power-failure checks for intermittent programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find idempotency violations in a memory-access trace
    Check {
        /// Trace file, or `-` for stdin
        trace: PathBuf,
        /// Address never reported (e.g. a checkpoint bookkeeping word)
        #[arg(short, long)]
        ignore: Option<Address>,
    },
    /// Print the failure schedule recorded in a metrics file
    ReplayTimes {
        /// Metrics file of the run to reproduce
        metrics: PathBuf,
        /// Leave out the final failure
        #[arg(long)]
        skip_last: bool,
    },
    /// Check that repeated runs agree on their output hash
    Verify {
        /// `NAME=FILE[,FILE...]`, or a directory of metrics files
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the length of every checkpoint section in a trace
    Sections {
        /// Trace file, or `-` for stdin
        trace: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("idemfault=info")),
        )
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { trace, ignore } => {
            let reader = TraceReader::open(&trace)?;
            let mut config = AnalyzerConfig::new();
            if let Some(address) = ignore {
                config = config.with_ignored(address);
            }
            let stdout = io::stdout();
            let summary = check_trace(reader, config, stdout.lock())?;
            tracing::info!(
                segments = summary.segments,
                reports = summary.reports_emitted,
                suppressed = summary.reports_suppressed,
                unrecognized = summary.unrecognized,
                violators = %format_addresses(&summary.violators),
                "trace checked"
            );
            Ok(())
        }
        Commands::ReplayTimes { metrics, skip_last } => {
            let mut sequence = load_replay_sequence(&metrics)?;
            if skip_last {
                sequence.pop();
            }
            let mut out = io::stdout().lock();
            for threshold in sequence {
                writeln!(out, "{threshold}")?;
            }
            Ok(())
        }
        Commands::Verify { targets, json } => {
            let targets = targets
                .iter()
                .map(String::as_str)
                .map(parse_target)
                .collect::<Result<Vec<_>>>()?;
            let report = HashVerifier::new().verify_targets(&targets)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for verdict in &report.targets {
                    println!("{}", styled_verdict(verdict));
                }
            }

            let failed = report.failed_targets().len();
            if failed > 0 {
                return Err(eyre!("{failed} target(s) failed verification"));
            }
            Ok(())
        }
        Commands::Sections { trace } => {
            let lengths = section_lengths(TraceReader::open(&trace)?)?;
            let mut out = io::stdout().lock();
            for length in lengths {
                writeln!(out, "{length}")?;
            }
            Ok(())
        }
    }
}

/// Verdict text, green when the target passed and red otherwise
fn styled_verdict(verdict: &TargetVerdict) -> String {
    if verdict.passed {
        style(verdict).green().to_string()
    } else {
        style(verdict).red().to_string()
    }
}

/// `NAME=FILE[,FILE...]` or a directory whose `*.json` files are the runs
fn parse_target(arg: &str) -> Result<(String, Vec<PathBuf>)> {
    if let Some((name, files)) = arg.split_once('=') {
        let paths: Vec<PathBuf> = files
            .split(',')
            .filter(|f| !f.is_empty())
            .map(PathBuf::from)
            .collect();
        return Ok((name.to_string(), paths));
    }

    let dir = Path::new(arg);
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).wrap_err_with(|| format!("reading target directory {arg}"))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    let name = dir
        .file_name()
        .map_or_else(|| arg.to_string(), |n| n.to_string_lossy().into_owned());
    Ok((name, paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use idemfault_certify::RunSummary;

    #[test]
    fn test_parse_named_target() {
        let (name, paths) = parse_target("crc=runs/0.json,runs/1.json").unwrap();
        assert_eq!(name, "crc");
        assert_eq!(paths, vec![PathBuf::from("runs/0.json"), PathBuf::from("runs/1.json")]);
    }

    #[test]
    fn test_parse_directory_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("crc");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("1.json"), "{}").unwrap();
        fs::write(target.join("0.json"), "{}").unwrap();
        fs::write(target.join("notes.txt"), "").unwrap();

        let (name, paths) = parse_target(target.to_str().unwrap()).unwrap();
        assert_eq!(name, "crc");
        assert_eq!(paths, vec![target.join("0.json"), target.join("1.json")]);
    }

    #[test]
    fn test_styled_verdict_matches_plain_rendering() {
        let verdict = TargetVerdict {
            target: "crc".to_string(),
            passed: false,
            runs: vec![RunSummary {
                label: "0".to_string(),
                hash: None,
                cycles: 10,
                passed: false,
            }],
        };
        console::set_colors_enabled(false);
        assert_eq!(styled_verdict(&verdict), verdict.to_string());
        assert!(styled_verdict(&verdict).ends_with("crc failed checks!"));
    }

    #[test]
    fn test_parse_missing_directory() {
        assert!(parse_target("/definitely/not/here").is_err());
    }

    #[test]
    fn test_cli_parses_check() {
        let cli = Cli::try_parse_from(["idemfault", "check", "trace.log", "--ignore", "0x20000000"]).unwrap();
        match cli.command {
            Commands::Check { trace, ignore } => {
                assert_eq!(trace, PathBuf::from("trace.log"));
                assert_eq!(ignore, Some(Address::new(0x2000_0000)));
            }
            _ => panic!("expected check"),
        }
    }
}
