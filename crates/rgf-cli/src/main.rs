//! `rgf`: run a certification session from a JSON job file.
//!
//! Exit codes: 0 when the report is certified, 2 when it is partial, 1 on
//! any hard failure.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use rgf_core::budget::CancelToken;
use rgf_core::model::PolynomialFlowModel;
use rgf_engine::serde::{report_from_json, report_to_json};
use rgf_engine::{report_hash, solve, ReportStatus, SolveConfig};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "rgf", about = "RG flow fixed-point certification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a solve session from a job file and write the sealed report.
    Solve(SolveArgs),
    /// Recompute the deterministic hash of an existing report.
    Hash(HashArgs),
}

#[derive(Args, Debug)]
struct SolveArgs {
    /// JSON job file holding the flow model and the solve configuration.
    #[arg(long)]
    config: PathBuf,
    /// Report output path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct HashArgs {
    /// Report JSON produced by `rgf solve`.
    #[arg(long)]
    report: PathBuf,
}

/// A job file is a flow model plus the solve configuration, in one document.
#[derive(Debug, Deserialize)]
struct JobFile {
    model: PolynomialFlowModel,
    #[serde(flatten)]
    config: SolveConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    // Only `solve` distinguishes partial results; `hash` succeeds or fails.
    let outcome = match cli.command {
        Command::Solve(args) => run_solve(&args).map(|status| match status {
            ReportStatus::Certified => ExitCode::SUCCESS,
            ReportStatus::Partial => ExitCode::from(2),
        }),
        Command::Hash(args) => run_hash(&args).map(|_| ExitCode::SUCCESS),
    };
    outcome.unwrap_or_else(|error| {
        eprintln!("rgf: {error}");
        ExitCode::FAILURE
    })
}

fn run_solve(args: &SolveArgs) -> Result<ReportStatus, Box<dyn Error>> {
    let job: JobFile = serde_json::from_str(&fs::read_to_string(&args.config)?)?;
    let model = job.model.validated()?;

    let report = solve(&model, &job.config, CancelToken::new())?;
    let json = report_to_json(&report)?;
    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(path, &json)?;
        }
        None => println!("{json}"),
    }
    eprintln!(
        "rgf: {} fixed point at residual {:.3e}, report hash {}",
        report.status.as_str(),
        report.fixed_point.residual_norm,
        report_hash(&report)?
    );
    Ok(report.status)
}

fn run_hash(args: &HashArgs) -> Result<(), Box<dyn Error>> {
    let report = report_from_json(&fs::read_to_string(&args.report)?)?;
    println!("{}", report_hash(&report)?);
    Ok(())
}
