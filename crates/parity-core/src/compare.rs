// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Cross-Implementation Comparator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Reference-vs-subject comparison.
//!
//! One comparison runs `Idle -> AxisCompared -> RunAttempted -> Reported`.
//! Each stage consumes the previous one, so a comparator cannot be re-run
//! or reported twice.

use crate::report::{
    AxisComparison, AxisComponent, AxisPoint, DiagnosticReport, SubjectInputSummary,
};
use crate::runner::{run_and_classify, RunOutcome, SubjectRunner};
use log::info;
use parity_types::config::ComparatorConfig;
use parity_types::error::ParityResult;
use parity_types::snapshot::EquilibriumSnapshot;
use parity_types::subject::SubjectSolverConfig;

fn relative_difference(reference: f64, guess: f64) -> (f64, f64) {
    let abs_diff = (guess - reference).abs();
    let rel_diff = if reference.abs() > f64::EPSILON {
        abs_diff / reference.abs()
    } else {
        abs_diff
    };
    (abs_diff, rel_diff)
}

/// Coefficient-by-coefficient check; a side shorter than the other is
/// padded with zeros, matching how the solver reads an unset axis mode.
fn push_branch(
    components: &mut Vec<AxisComponent>,
    label: &str,
    reference: &[f64],
    guess: &[f64],
    tolerance: f64,
) {
    let len = reference.len().max(guess.len());
    for n in 0..len {
        let r = reference.get(n).copied().unwrap_or(0.0);
        let g = guess.get(n).copied().unwrap_or(0.0);
        let (abs_diff, rel_diff) = relative_difference(r, g);
        components.push(AxisComponent {
            label: format!("{label}[n={n}]"),
            reference: r,
            subject_guess: g,
            abs_diff,
            rel_diff,
            mismatch: rel_diff > tolerance,
        });
    }
}

/// Compares the subject's initial axis guess with the reference converged axis.
///
/// Symmetric branches are always compared. The antisymmetric branches are
/// compared when either side carries them.
pub fn compare_axis_initialization(
    snapshot: &EquilibriumSnapshot,
    subject: &SubjectSolverConfig,
    config: &ComparatorConfig,
) -> AxisComparison {
    let tolerance = config.axis_tolerance;
    let axis = &snapshot.final_axis;
    let mut components = Vec::new();

    push_branch(&mut components, "raxis_cc", &axis.raxis_cc, &subject.raxis_c, tolerance);
    push_branch(&mut components, "zaxis_cs", &axis.zaxis_cs, &subject.zaxis_s, tolerance);
    if axis.raxis_cs.is_some() || subject.raxis_s.is_some() {
        push_branch(
            &mut components,
            "raxis_cs",
            axis.raxis_cs.as_deref().unwrap_or_default(),
            subject.raxis_s.as_deref().unwrap_or_default(),
            tolerance,
        );
    }
    if axis.zaxis_cc.is_some() || subject.zaxis_c.is_some() {
        push_branch(
            &mut components,
            "zaxis_cc",
            axis.zaxis_cc.as_deref().unwrap_or_default(),
            subject.zaxis_c.as_deref().unwrap_or_default(),
            tolerance,
        );
    }

    let subject_guess = AxisPoint {
        r: subject.initial_r(),
        z: subject.initial_z(),
    };
    let reference_initial_guess = config
        .reference_initial_axis
        .map(|g| AxisPoint {
            r: g.raxis,
            z: g.zaxis,
        })
        .unwrap_or(subject_guess);

    AxisComparison {
        tolerance,
        mismatch: components.iter().any(|c| c.mismatch),
        components,
        reference_axis: AxisPoint {
            r: axis.r_at_origin(),
            z: axis.z_at_origin(),
        },
        subject_guess,
        reference_initial_guess,
    }
}

/// Assembles the report for one comparison.
///
/// `convergence_threshold` decides whether the reference residuals count as
/// a converged run; see [`ComparatorConfig::convergence_threshold_for`].
pub fn build_report(
    axis: AxisComparison,
    outcome: RunOutcome,
    snapshot: &EquilibriumSnapshot,
    subject: &SubjectSolverConfig,
    convergence_threshold: f64,
) -> DiagnosticReport {
    DiagnosticReport::assemble(
        axis,
        outcome,
        snapshot,
        SubjectInputSummary::from_config(subject),
        convergence_threshold,
    )
}

/// A comparison that has not started yet.
#[derive(Debug)]
pub struct Comparator<'a> {
    snapshot: &'a EquilibriumSnapshot,
    subject: &'a SubjectSolverConfig,
    config: ComparatorConfig,
}

/// Axis check done; the subject has not been run.
#[derive(Debug)]
pub struct AxisCompared<'a> {
    session: Comparator<'a>,
    axis: AxisComparison,
}

/// Subject run captured; ready to report.
#[derive(Debug)]
pub struct RunAttempted<'a> {
    session: Comparator<'a>,
    axis: AxisComparison,
    outcome: RunOutcome,
}

impl<'a> Comparator<'a> {
    pub fn new(
        snapshot: &'a EquilibriumSnapshot,
        subject: &'a SubjectSolverConfig,
        config: ComparatorConfig,
    ) -> ParityResult<Self> {
        config.validate()?;
        Ok(Comparator {
            snapshot,
            subject,
            config,
        })
    }

    pub fn compare_axes(self) -> AxisCompared<'a> {
        let axis = compare_axis_initialization(self.snapshot, self.subject, &self.config);
        info!(
            "axis comparison: {} components, {} beyond tolerance {:e}",
            axis.components.len(),
            axis.mismatched().count(),
            axis.tolerance
        );
        AxisCompared {
            session: self,
            axis,
        }
    }
}

impl<'a> AxisCompared<'a> {
    pub fn axis(&self) -> &AxisComparison {
        &self.axis
    }

    pub fn run<R>(self, runner: &mut R) -> RunAttempted<'a>
    where
        R: SubjectRunner + ?Sized,
    {
        let outcome = run_and_classify(self.session.subject, runner);
        RunAttempted {
            session: self.session,
            axis: self.axis,
            outcome,
        }
    }
}

impl RunAttempted<'_> {
    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    pub fn report(self) -> DiagnosticReport {
        let threshold = self
            .session
            .config
            .convergence_threshold_for(self.session.subject);
        let report = build_report(
            self.axis,
            self.outcome,
            self.session.snapshot,
            self.session.subject,
            threshold,
        );
        info!("finding: {}", report.finding);
        report
    }
}

/// Runs a whole comparison end to end.
pub fn compare<R>(
    snapshot: &EquilibriumSnapshot,
    subject: &SubjectSolverConfig,
    config: ComparatorConfig,
    runner: &mut R,
) -> ParityResult<DiagnosticReport>
where
    R: SubjectRunner + ?Sized,
{
    Ok(Comparator::new(snapshot, subject, config)?
        .compare_axes()
        .run(runner)
        .report())
}
