// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Command Line
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! `vmec-parity`: extract reference snapshots and compare a subject solver
//! against them.
//!
//! Exit status is 0 whenever a command completes, including comparisons in
//! which the subject run failed. I/O, container and schema errors exit 1.

use clap::{Parser, Subcommand};
use log::{error, info};
use parity_core::compare::compare;
use parity_core::extract::{extract_from_path, read_snapshot, write_snapshot};
use parity_core::input::load_subject_config;
use parity_core::reader::list_container;
use parity_core::runner::ProcessRunner;
use parity_types::config::ComparatorConfig;
use parity_types::error::ParityResult;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "vmec-parity")]
#[command(version)]
#[command(about = "Reference snapshot extraction and cross-implementation comparison for VMEC")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract a reference snapshot from an output container
    Extract {
        /// Reference output container (.nc or .npz)
        container: PathBuf,
        /// Where to write the snapshot document
        snapshot_out: PathBuf,
    },
    /// Compare a subject input against a reference snapshot
    Compare {
        /// Subject solver input (INDATA namelist or .json)
        subject_input: PathBuf,
        /// Reference snapshot document
        snapshot: PathBuf,
        /// Program that runs the subject solver; the input path is appended
        #[arg(long)]
        runner: PathBuf,
        /// Extra argument passed to the runner before the input path
        #[arg(long = "runner-arg", allow_hyphen_values = true)]
        runner_args: Vec<String>,
        /// Comparator settings (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Relative axis tolerance, overrides the config file
        #[arg(long)]
        tolerance: Option<f64>,
        /// Write the report as JSON
        #[arg(long)]
        report_out: Option<PathBuf>,
    },
    /// List global attributes and variables of a container
    Inspect {
        /// Output container (.nc or .npz)
        container: PathBuf,
    },
}

fn run_extract(container: PathBuf, snapshot_out: PathBuf) -> ParityResult<()> {
    let snapshot = extract_from_path(&container)?;
    write_snapshot(&snapshot, &snapshot_out)?;
    println!(
        "{} -> {} ({} modes, {} surfaces)",
        container.display(),
        snapshot_out.display(),
        snapshot.fourier_modes.mnmax,
        snapshot.asymmetric_coefficients.ns()
    );
    Ok(())
}

fn run_compare(
    subject_input: PathBuf,
    snapshot: PathBuf,
    runner: PathBuf,
    runner_args: Vec<String>,
    config: Option<PathBuf>,
    tolerance: Option<f64>,
    report_out: Option<PathBuf>,
) -> ParityResult<()> {
    let snapshot = read_snapshot(&snapshot)?;
    let subject = load_subject_config(&subject_input)?;
    let mut comparator_config = match config {
        Some(path) => ComparatorConfig::from_file(path)?,
        None => ComparatorConfig::default(),
    };
    if let Some(tol) = tolerance {
        comparator_config.axis_tolerance = tol;
    }

    let mut runner = ProcessRunner::new(runner, runner_args);
    let report = compare(&snapshot, &subject, comparator_config, &mut runner)?;
    print!("{report}");

    if let Some(path) = report_out {
        std::fs::write(&path, report.to_json()? + "\n")?;
        info!("report written to '{}'", path.display());
    }
    Ok(())
}

fn run_inspect(container: PathBuf) -> ParityResult<()> {
    let listing = list_container(&container)?;
    println!("{}", listing.source);
    println!("global attributes:");
    for attr in &listing.attributes {
        println!("  {:<24} {}", attr.name, attr.value);
    }
    println!("variables:");
    for var in &listing.variables {
        println!("  {:<24} {:?}", var.name, var.shape);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = match args.command {
        Commands::Extract {
            container,
            snapshot_out,
        } => run_extract(container, snapshot_out),
        Commands::Compare {
            subject_input,
            snapshot,
            runner,
            runner_args,
            config,
            tolerance,
            report_out,
        } => run_compare(
            subject_input,
            snapshot,
            runner,
            runner_args,
            config,
            tolerance,
            report_out,
        ),
        Commands::Inspect { container } => run_inspect(container),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
