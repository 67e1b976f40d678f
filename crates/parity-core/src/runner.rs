// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Subject Runner
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Invoking the subject solver and classifying how it ended.
//!
//! Classification is by error variant only. A runner that wants its failure
//! recognised as a Jacobian degeneracy must say so with
//! [`SubjectRunError::JacobianDegeneracy`]; message text is never inspected.

use log::{debug, info, warn};
use parity_types::snapshot::ConvergenceResiduals;
use parity_types::subject::{SubjectRunResult, SubjectSolverConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubjectRunError {
    #[error("degenerate coordinate Jacobian: {detail}")]
    JacobianDegeneracy {
        iteration: Option<usize>,
        detail: String,
    },

    #[error("no convergence: max residual {:.3e}", .residuals.max())]
    NonConvergence {
        residuals: ConvergenceResiduals,
        iterations: Option<usize>,
    },

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("{0}")]
    Other(String),
}

/// The external subject-solver capability. Blocking; no timeout is applied.
pub trait SubjectRunner {
    fn run(&mut self, config: &SubjectSolverConfig) -> Result<SubjectRunResult, SubjectRunError>;
}

impl<F> SubjectRunner for F
where
    F: FnMut(&SubjectSolverConfig) -> Result<SubjectRunResult, SubjectRunError>,
{
    fn run(&mut self, config: &SubjectSolverConfig) -> Result<SubjectRunResult, SubjectRunError> {
        self(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    JacobianDegeneracy,
    NonConvergence { residuals: ConvergenceResiduals },
    ConfigurationInvalid,
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Converged {
        residuals: ConvergenceResiduals,
        iterations: Option<usize>,
    },
    Failed {
        failure: FailureKind,
        /// Original error text, kept verbatim.
        message: String,
        iteration: Option<usize>,
    },
}

impl RunOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, RunOutcome::Converged { .. })
    }

    pub fn failure(&self) -> Option<&FailureKind> {
        match self {
            RunOutcome::Failed { failure, .. } => Some(failure),
            RunOutcome::Converged { .. } => None,
        }
    }
}

/// Maps a runner error onto the fixed failure taxonomy.
pub fn classify(error: SubjectRunError) -> RunOutcome {
    let message = error.to_string();
    let (failure, iteration) = match error {
        SubjectRunError::JacobianDegeneracy { iteration, .. } => {
            (FailureKind::JacobianDegeneracy, iteration)
        }
        SubjectRunError::NonConvergence {
            residuals,
            iterations,
        } => (FailureKind::NonConvergence { residuals }, iterations),
        SubjectRunError::ConfigurationInvalid(_) => (FailureKind::ConfigurationInvalid, None),
        SubjectRunError::Other(_) => (FailureKind::Unclassified, None),
    };
    RunOutcome::Failed {
        failure,
        message,
        iteration,
    }
}

/// Runs the subject solver once and captures the result; never fails.
pub fn run_and_classify<R>(config: &SubjectSolverConfig, runner: &mut R) -> RunOutcome
where
    R: SubjectRunner + ?Sized,
{
    info!("running subject solver (lasym={})", config.lasym);
    match runner.run(config) {
        Ok(result) => {
            info!(
                "subject solver converged: fsqr={:.2e}, fsqz={:.2e}, fsql={:.2e}",
                result.residuals.fsqr, result.residuals.fsqz, result.residuals.fsql
            );
            RunOutcome::Converged {
                residuals: result.residuals,
                iterations: result.iterations,
            }
        }
        Err(e) => {
            warn!("subject solver failed: {e}");
            classify(e)
        }
    }
}

/// Status line an external runner prints on stdout.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum StatusDocument {
    Converged {
        residuals: ConvergenceResiduals,
        #[serde(default)]
        iterations: Option<usize>,
    },
    Failed {
        failure: ReportedFailure,
        #[serde(default)]
        message: String,
        #[serde(default)]
        iteration: Option<usize>,
        #[serde(default)]
        residuals: Option<ConvergenceResiduals>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReportedFailure {
    JacobianDegeneracy,
    NonConvergence,
    ConfigurationInvalid,
    #[serde(other)]
    Other,
}

impl StatusDocument {
    fn into_result(self) -> Result<SubjectRunResult, SubjectRunError> {
        match self {
            StatusDocument::Converged {
                residuals,
                iterations,
            } => Ok(SubjectRunResult {
                residuals,
                iterations,
            }),
            StatusDocument::Failed {
                failure,
                message,
                iteration,
                residuals,
            } => Err(match (failure, residuals) {
                (ReportedFailure::JacobianDegeneracy, _) => SubjectRunError::JacobianDegeneracy {
                    iteration,
                    detail: message,
                },
                (ReportedFailure::NonConvergence, Some(residuals)) => {
                    SubjectRunError::NonConvergence {
                        residuals,
                        iterations: iteration,
                    }
                }
                (ReportedFailure::ConfigurationInvalid, _) => {
                    SubjectRunError::ConfigurationInvalid(message)
                }
                (ReportedFailure::NonConvergence, None) => SubjectRunError::Other(format!(
                    "non_convergence reported without residuals: {message}"
                )),
                (ReportedFailure::Other, _) => SubjectRunError::Other(message),
            }),
        }
    }
}

/// Last stdout line that parses as a status document.
fn parse_status(stdout: &str) -> Option<StatusDocument> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
}

fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(max_lines)..].join("\n")
}

/// Runs an external program with the subject input path as its last argument.
///
/// The program reports through a one-line JSON status document on stdout:
/// `{"status":"converged","residuals":{"fsqr":..,"fsqz":..,"fsql":..}}` or
/// `{"status":"failed","failure":"jacobian_degeneracy","message":".."}`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        ProcessRunner {
            program: program.into(),
            args,
        }
    }
}

impl SubjectRunner for ProcessRunner {
    fn run(&mut self, config: &SubjectSolverConfig) -> Result<SubjectRunResult, SubjectRunError> {
        let input = config.source_path.as_ref().ok_or_else(|| {
            SubjectRunError::ConfigurationInvalid(
                "subject input was not loaded from a file; nothing to hand to the runner"
                    .to_string(),
            )
        })?;
        debug!(
            "spawning {} {:?} {}",
            self.program.display(),
            self.args,
            input.display()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .output()
            .map_err(|e| {
                SubjectRunError::Other(format!(
                    "failed to launch '{}': {e}",
                    self.program.display()
                ))
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_status(&stdout) {
            Some(doc) => doc.into_result(),
            None => Err(SubjectRunError::Other(format!(
                "runner exited with {} without a status document; stderr: {}",
                output.status,
                tail(&String::from_utf8_lossy(&output.stderr), 5)
            ))),
        }
    }
}
