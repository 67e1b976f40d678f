// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Diagnostic Report
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The diagnostic report produced once per comparison.
//!
//! A report is assembled from an axis comparison, a classified subject run
//! and the reference snapshot. Its narrative is conditional: the recovery
//! finding is only asserted when the reference residuals show convergence
//! and the reference started from a guess no better than the subject's.

use crate::runner::{FailureKind, RunOutcome};
use parity_types::constants::RECOVERY_FINDING;
use parity_types::snapshot::{ConvergenceResiduals, EquilibriumSnapshot};
use parity_types::subject::{BoundaryBranch, SubjectSolverConfig};
use serde::Serialize;
use std::fmt;

/// Axis position at toroidal angle zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisPoint {
    pub r: f64,
    pub z: f64,
}

impl AxisPoint {
    pub fn distance_to(&self, other: &AxisPoint) -> f64 {
        (self.r - other.r).hypot(self.z - other.z)
    }
}

impl fmt::Display for AxisPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(R={}, Z={})", self.r, self.z)
    }
}

/// One axis coefficient checked against the reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisComponent {
    /// Reference coefficient name and toroidal mode, e.g. `raxis_cc[n=0]`.
    pub label: String,
    pub reference: f64,
    pub subject_guess: f64,
    pub abs_diff: f64,
    /// `abs_diff / |reference|`; falls back to `abs_diff` for a zero reference.
    pub rel_diff: f64,
    pub mismatch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisComparison {
    pub tolerance: f64,
    pub components: Vec<AxisComponent>,
    /// True when any component exceeds the tolerance.
    pub mismatch: bool,
    pub reference_axis: AxisPoint,
    pub subject_guess: AxisPoint,
    pub reference_initial_guess: AxisPoint,
}

impl AxisComparison {
    pub fn mismatched(&self) -> impl Iterator<Item = &AxisComponent> {
        self.components.iter().filter(|c| c.mismatch)
    }

    /// Distance of the subject's start from the reference converged axis.
    pub fn subject_guess_error(&self) -> f64 {
        self.subject_guess.distance_to(&self.reference_axis)
    }

    /// Distance of the reference run's start from its own converged axis.
    pub fn reference_guess_error(&self) -> f64 {
        self.reference_initial_guess.distance_to(&self.reference_axis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceOutcome {
    pub source: String,
    pub axis: AxisPoint,
    pub residuals: ConvergenceResiduals,
    pub convergence_threshold: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryTerm {
    pub branch: &'static str,
    pub m: usize,
    pub n: i64,
    pub value: f64,
}

/// What the subject was started with, beyond the axis guess.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectInputSummary {
    pub source: Option<String>,
    pub lasym: bool,
    pub nfp: u32,
    pub mpol: usize,
    pub ntor: usize,
    /// Nonzero RBS and ZBC boundary entries.
    pub asymmetric_boundary: Vec<BoundaryTerm>,
}

impl SubjectInputSummary {
    pub fn from_config(config: &SubjectSolverConfig) -> Self {
        let mut asymmetric_boundary = Vec::new();
        for (branch, label) in [(BoundaryBranch::Rbs, "rbs"), (BoundaryBranch::Zbc, "zbc")] {
            asymmetric_boundary.extend(config.nonzero_entries(branch).into_iter().map(
                |(m, n, value)| BoundaryTerm {
                    branch: label,
                    m,
                    n,
                    value,
                },
            ));
        }
        SubjectInputSummary {
            source: config
                .source_path
                .as_ref()
                .map(|p| p.display().to_string()),
            lasym: config.lasym,
            nfp: config.nfp,
            mpol: config.mpol,
            ntor: config.ntor,
            asymmetric_boundary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    /// Subject hit a degenerate Jacobian; reference converged from a start
    /// at least as far from the converged axis.
    ReferenceRecoversSubjectDoesNot,
    BothConverged,
    SubjectOnlyConverged,
    /// Subject failed, reference converged, recovery not established.
    SubjectFailed,
    NeitherConverged,
}

impl Finding {
    pub fn determine(
        axis: &AxisComparison,
        outcome: &RunOutcome,
        reference_converged: bool,
    ) -> Finding {
        match (outcome, reference_converged) {
            (RunOutcome::Converged { .. }, true) => Finding::BothConverged,
            (RunOutcome::Converged { .. }, false) => Finding::SubjectOnlyConverged,
            (RunOutcome::Failed { .. }, false) => Finding::NeitherConverged,
            (
                RunOutcome::Failed {
                    failure: FailureKind::JacobianDegeneracy,
                    ..
                },
                true,
            ) if axis.reference_guess_error() >= axis.subject_guess_error() => {
                Finding::ReferenceRecoversSubjectDoesNot
            }
            (RunOutcome::Failed { .. }, true) => Finding::SubjectFailed,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::ReferenceRecoversSubjectDoesNot => write!(f, "{RECOVERY_FINDING}"),
            Finding::BothConverged => write!(f, "both solvers converged"),
            Finding::SubjectOnlyConverged => {
                write!(f, "subject solver converged; reference run did not")
            }
            Finding::SubjectFailed => write!(f, "subject solver failed; reference converged"),
            Finding::NeitherConverged => write!(f, "neither solver converged"),
        }
    }
}

/// Immutable result of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub reference: ReferenceOutcome,
    pub subject_initial_axis: AxisPoint,
    pub reference_initial_axis: AxisPoint,
    pub axis_comparison: AxisComparison,
    pub subject_run: RunOutcome,
    pub subject_input: SubjectInputSummary,
    pub finding: Finding,
    pub narrative: Vec<String>,
}

impl DiagnosticReport {
    pub(crate) fn assemble(
        axis: AxisComparison,
        outcome: RunOutcome,
        snapshot: &EquilibriumSnapshot,
        subject_input: SubjectInputSummary,
        convergence_threshold: f64,
    ) -> Self {
        let residuals = snapshot.convergence;
        let reference = ReferenceOutcome {
            source: snapshot.provenance.source.clone(),
            axis: axis.reference_axis,
            residuals,
            convergence_threshold,
            converged: residuals.converged_below(convergence_threshold),
        };
        let finding = Finding::determine(&axis, &outcome, reference.converged);
        let narrative = narrate(&axis, &outcome, &reference, &subject_input, finding);
        DiagnosticReport {
            subject_initial_axis: axis.subject_guess,
            reference_initial_axis: axis.reference_initial_guess,
            reference,
            axis_comparison: axis,
            subject_run: outcome,
            subject_input,
            finding,
            narrative,
        }
    }

    pub fn asserts_recovery(&self) -> bool {
        self.finding == Finding::ReferenceRecoversSubjectDoesNot
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn narrate(
    axis: &AxisComparison,
    outcome: &RunOutcome,
    reference: &ReferenceOutcome,
    subject_input: &SubjectInputSummary,
    finding: Finding,
) -> Vec<String> {
    let mut lines = Vec::new();

    if axis.mismatch {
        let worst = axis
            .mismatched()
            .map(|c| c.label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "Subject initial axis {} differs from the reference converged axis {} \
             beyond relative tolerance {:e} ({worst}).",
            axis.subject_guess, axis.reference_axis, axis.tolerance
        ));
    } else {
        lines.push(format!(
            "Subject initial axis {} matches the reference converged axis {} within {:e}.",
            axis.subject_guess, axis.reference_axis, axis.tolerance
        ));
    }

    if reference.converged {
        lines.push(format!(
            "Reference run converged: max residual {:.3e} <= {:e}.",
            reference.residuals.max(),
            reference.convergence_threshold
        ));
    } else {
        lines.push(format!(
            "Reference run did not converge: max residual {:.3e} > {:e}.",
            reference.residuals.max(),
            reference.convergence_threshold
        ));
    }

    match outcome {
        RunOutcome::Converged {
            residuals,
            iterations,
        } => {
            let iters = iterations
                .map(|n| format!(" after {n} iterations"))
                .unwrap_or_default();
            lines.push(format!(
                "Subject run converged{iters}: max residual {:.3e}.",
                residuals.max()
            ));
        }
        RunOutcome::Failed {
            failure, message, ..
        } => {
            let kind = match failure {
                FailureKind::JacobianDegeneracy => "degenerate coordinate Jacobian",
                FailureKind::NonConvergence { .. } => "non-convergence",
                FailureKind::ConfigurationInvalid => "invalid configuration",
                FailureKind::Unclassified => "unclassified error",
            };
            lines.push(format!("Subject run failed ({kind}): {message}"));
        }
    }

    if subject_input.lasym && !subject_input.asymmetric_boundary.is_empty() {
        lines.push(format!(
            "Subject input is asymmetric with {} nonzero RBS/ZBC boundary terms.",
            subject_input.asymmetric_boundary.len()
        ));
    }

    if finding == Finding::ReferenceRecoversSubjectDoesNot {
        lines.push(format!("Finding: {RECOVERY_FINDING}."));
        lines.push(format!(
            "Reference started at {} ({:.6e} from converged) and reached {}; \
             subject started at {} ({:.6e} from converged) and stopped.",
            axis.reference_initial_guess,
            axis.reference_guess_error(),
            axis.reference_axis,
            axis.subject_guess,
            axis.subject_guess_error()
        ));
    } else {
        lines.push(format!("Finding: {finding}."));
    }
    lines
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== VMEC parity report ===")?;
        writeln!(f, "reference: {}", self.reference.source)?;
        if let Some(source) = &self.subject_input.source {
            writeln!(f, "subject input: {source}")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<16} {:>22} {:>22} {:>12}  ",
            "axis", "reference", "subject guess", "rel diff"
        )?;
        for c in &self.axis_comparison.components {
            let flag = if c.mismatch { "MISMATCH" } else { "ok" };
            writeln!(
                f,
                "{:<16} {:>22.15e} {:>22.15e} {:>12.3e}  {flag}",
                c.label, c.reference, c.subject_guess, c.rel_diff
            )?;
        }
        writeln!(f)?;
        for line in &self.narrative {
            writeln!(f, "- {line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(subject: AxisPoint, reference_start: AxisPoint) -> AxisComparison {
        let reference_axis = AxisPoint { r: 0.998765, z: 0.0 };
        let abs_diff = (reference_axis.r - subject.r).abs();
        AxisComparison {
            tolerance: 1e-6,
            components: vec![AxisComponent {
                label: "raxis_cc[n=0]".to_string(),
                reference: reference_axis.r,
                subject_guess: subject.r,
                abs_diff,
                rel_diff: abs_diff / reference_axis.r,
                mismatch: abs_diff / reference_axis.r > 1e-6,
            }],
            mismatch: abs_diff / reference_axis.r > 1e-6,
            reference_axis,
            subject_guess: subject,
            reference_initial_guess: reference_start,
        }
    }

    fn jacobian_failure() -> RunOutcome {
        RunOutcome::Failed {
            failure: FailureKind::JacobianDegeneracy,
            message: "degenerate coordinate Jacobian: sign change".to_string(),
            iteration: Some(1),
        }
    }

    const ORIGIN: AxisPoint = AxisPoint { r: 0.0, z: 0.0 };

    #[test]
    fn test_recovery_requires_reference_convergence() {
        let axis = comparison(ORIGIN, ORIGIN);
        assert_eq!(
            Finding::determine(&axis, &jacobian_failure(), true),
            Finding::ReferenceRecoversSubjectDoesNot
        );
        assert_eq!(
            Finding::determine(&axis, &jacobian_failure(), false),
            Finding::NeitherConverged
        );
    }

    #[test]
    fn test_recovery_holds_when_subject_guess_is_within_tolerance() {
        let reference_axis = AxisPoint { r: 0.998765, z: 0.0 };
        let axis = comparison(reference_axis, ORIGIN);
        assert!(!axis.mismatch);
        assert_eq!(
            Finding::determine(&axis, &jacobian_failure(), true),
            Finding::ReferenceRecoversSubjectDoesNot
        );
    }

    #[test]
    fn test_better_reference_start_is_not_recovery() {
        let subject = AxisPoint { r: 0.5, z: 0.0 };
        let reference_start = AxisPoint { r: 0.99, z: 0.0 };
        let axis = comparison(subject, reference_start);
        assert_eq!(
            Finding::determine(&axis, &jacobian_failure(), true),
            Finding::SubjectFailed
        );
    }

    #[test]
    fn test_other_failures_are_not_recovery() {
        let axis = comparison(ORIGIN, ORIGIN);
        let outcome = RunOutcome::Failed {
            failure: FailureKind::Unclassified,
            message: "BAD_JACOBIAN".to_string(),
            iteration: None,
        };
        assert_eq!(
            Finding::determine(&axis, &outcome, true),
            Finding::SubjectFailed
        );
    }

    #[test]
    fn test_converged_subject_findings() {
        let axis = comparison(ORIGIN, ORIGIN);
        let outcome = RunOutcome::Converged {
            residuals: ConvergenceResiduals {
                fsqr: 1e-14,
                fsqz: 1e-14,
                fsql: 1e-14,
            },
            iterations: None,
        };
        assert_eq!(
            Finding::determine(&axis, &outcome, true),
            Finding::BothConverged
        );
        assert_eq!(
            Finding::determine(&axis, &outcome, false),
            Finding::SubjectOnlyConverged
        );
    }

    #[test]
    fn test_axis_point_distance() {
        let a = AxisPoint { r: 3.0, z: 0.0 };
        let b = AxisPoint { r: 0.0, z: 4.0 };
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
        assert_eq!(a.to_string(), "(R=3, Z=0)");
    }
}
