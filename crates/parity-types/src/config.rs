// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{DEFAULT_AXIS_TOLERANCE, DEFAULT_CONVERGENCE_THRESHOLD};
use crate::error::{ParityError, ParityResult};
use crate::subject::SubjectSolverConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Comparator settings. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Relative tolerance between the subject's initial axis guess and the
    /// reference converged axis (default: 1e-6).
    #[serde(default = "default_axis_tolerance")]
    pub axis_tolerance: f64,
    /// Residual level at or below which the reference run counts as converged.
    /// When absent, the subject input's `ftol` is used, then 1e-10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_threshold: Option<f64>,
    /// Axis guess the reference run started from, when it differs from the
    /// subject input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_initial_axis: Option<AxisGuess>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisGuess {
    pub raxis: f64,
    pub zaxis: f64,
}

fn default_axis_tolerance() -> f64 {
    DEFAULT_AXIS_TOLERANCE
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        ComparatorConfig {
            axis_tolerance: default_axis_tolerance(),
            convergence_threshold: None,
            reference_initial_axis: None,
        }
    }
}

impl ComparatorConfig {
    /// Load from JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ParityResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ParityResult<()> {
        if !(self.axis_tolerance.is_finite() && self.axis_tolerance > 0.0) {
            return Err(ParityError::ConfigError(format!(
                "axis_tolerance must be finite and > 0, got {}",
                self.axis_tolerance
            )));
        }
        if let Some(threshold) = self.convergence_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(ParityError::ConfigError(format!(
                    "convergence_threshold must be finite and > 0, got {threshold}"
                )));
            }
        }
        if let Some(guess) = self.reference_initial_axis {
            if !guess.raxis.is_finite() || !guess.zaxis.is_finite() {
                return Err(ParityError::ConfigError(
                    "reference_initial_axis contains non-finite values".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Threshold for judging reference convergence against this subject input.
    pub fn convergence_threshold_for(&self, subject: &SubjectSolverConfig) -> f64 {
        self.convergence_threshold
            .or(subject.ftol)
            .unwrap_or(DEFAULT_CONVERGENCE_THRESHOLD)
    }
}
