// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Snapshot
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Canonical, solver-agnostic record of one converged reference run.
//!
//! Field order here is the field order of the persisted document.
//! Optional branches are always written (as `null` when absent) so that a
//! symmetric and an asymmetric snapshot share one layout. Unknown document
//! fields are rejected, except inside the residual triple, which is shared
//! with the runner status protocol.

use crate::error::{ParityError, ParityResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EquilibriumSnapshot {
    pub version: u32,
    pub provenance: SnapshotProvenance,
    pub final_axis: AxisGeometry,
    pub convergence: ConvergenceResiduals,
    pub equilibrium: EquilibriumScalars,
    pub fourier_modes: FourierModeIndex,
    pub asymmetric_coefficients: AsymmetricCoefficients,
}

/// Where the snapshot came from. Attributes are copied verbatim from the
/// container's global metadata, in container order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotProvenance {
    pub source: String,
    pub attributes: Vec<GlobalAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalAttribute {
    pub name: String,
    pub value: f64,
}

/// Magnetic axis Fourier coefficients (toroidal modes n = 0..=ntor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisGeometry {
    pub raxis_cc: Vec<f64>,
    pub zaxis_cs: Vec<f64>,
    #[serde(default)]
    pub raxis_cs: Option<Vec<f64>>,
    #[serde(default)]
    pub zaxis_cc: Option<Vec<f64>>,
}

impl AxisGeometry {
    /// Axis R at toroidal angle zero.
    pub fn r_at_origin(&self) -> f64 {
        self.raxis_cc.iter().sum()
    }

    /// Axis Z at toroidal angle zero. Sine terms vanish there, so only the
    /// asymmetric cosine branch contributes.
    pub fn z_at_origin(&self) -> f64 {
        self.zaxis_cc.as_ref().map_or(0.0, |z| z.iter().sum())
    }

    pub fn is_asymmetric(&self) -> bool {
        self.raxis_cs.is_some() || self.zaxis_cc.is_some()
    }
}

/// Force-balance residuals: radial, vertical, lambda constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceResiduals {
    pub fsqr: f64,
    pub fsqz: f64,
    pub fsql: f64,
}

impl ConvergenceResiduals {
    pub fn max(&self) -> f64 {
        self.fsqr.max(self.fsqz).max(self.fsql)
    }

    /// True when every residual is finite and at or below `threshold`.
    pub fn converged_below(&self, threshold: f64) -> bool {
        [self.fsqr, self.fsqz, self.fsql]
            .iter()
            .all(|r| r.is_finite() && *r <= threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EquilibriumScalars {
    pub aspect: f64,
    pub volume: f64,
    pub wmhd: f64,
    pub betatotal: f64,
    pub betapol: f64,
    pub betator: f64,
    /// Rotational transform on the full radial mesh.
    pub iotaf: Vec<f64>,
}

/// Column ordering shared by every coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FourierModeIndex {
    pub mnmax: usize,
    pub xm: Vec<i64>,
    pub xn: Vec<i64>,
}

impl FourierModeIndex {
    /// Column of mode (m, n), if present.
    pub fn column_of(&self, m: i64, n: i64) -> Option<usize> {
        self.xm
            .iter()
            .zip(self.xn.iter())
            .position(|(&xm, &xn)| xm == m && xn == n)
    }
}

/// Spectral coefficient tables, flux surface × mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsymmetricCoefficients {
    #[serde(with = "crate::matrix_serde")]
    pub rmnc: Array2<f64>,
    #[serde(with = "crate::matrix_serde")]
    pub zmns: Array2<f64>,
    #[serde(default, with = "crate::matrix_serde::optional")]
    pub rmns: Option<Array2<f64>>,
    #[serde(default, with = "crate::matrix_serde::optional")]
    pub zmnc: Option<Array2<f64>>,
    #[serde(default, with = "crate::matrix_serde::optional")]
    pub lmns: Option<Array2<f64>>,
}

impl AsymmetricCoefficients {
    fn tables(&self) -> [(&'static str, Option<&Array2<f64>>); 5] {
        [
            ("rmnc", Some(&self.rmnc)),
            ("zmns", Some(&self.zmns)),
            ("rmns", self.rmns.as_ref()),
            ("zmnc", self.zmnc.as_ref()),
            ("lmns", self.lmns.as_ref()),
        ]
    }

    /// Number of flux surfaces.
    pub fn ns(&self) -> usize {
        self.rmnc.nrows()
    }

    pub fn has_asymmetric_branch(&self) -> bool {
        self.rmns.is_some() || self.zmnc.is_some()
    }
}

fn ensure_finite(label: &str, values: &[f64]) -> ParityResult<()> {
    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
        return Err(ParityError::SchemaViolation(format!(
            "{label}[{idx}] is non-finite ({})",
            values[idx]
        )));
    }
    Ok(())
}

impl EquilibriumSnapshot {
    /// Checks the schema invariants the document relies on: mode-index
    /// lengths, table widths, one row per flux surface in every table and in
    /// `iotaf`, and finiteness.
    pub fn validate(&self) -> ParityResult<()> {
        let axis = &self.final_axis;
        if axis.raxis_cc.is_empty() || axis.zaxis_cs.is_empty() {
            return Err(ParityError::SchemaViolation(
                "axis coefficients must contain at least the n=0 mode".to_string(),
            ));
        }
        ensure_finite("raxis_cc", &axis.raxis_cc)?;
        ensure_finite("zaxis_cs", &axis.zaxis_cs)?;
        if let Some(raxis_cs) = &axis.raxis_cs {
            ensure_finite("raxis_cs", raxis_cs)?;
        }
        if let Some(zaxis_cc) = &axis.zaxis_cc {
            ensure_finite("zaxis_cc", zaxis_cc)?;
        }

        let res = &self.convergence;
        ensure_finite("convergence", &[res.fsqr, res.fsqz, res.fsql])?;

        let eq = &self.equilibrium;
        ensure_finite(
            "equilibrium",
            &[
                eq.aspect,
                eq.volume,
                eq.wmhd,
                eq.betatotal,
                eq.betapol,
                eq.betator,
            ],
        )?;
        ensure_finite("iotaf", &eq.iotaf)?;

        for attr in &self.provenance.attributes {
            if !attr.value.is_finite() {
                return Err(ParityError::SchemaViolation(format!(
                    "global attribute '{}' is non-finite",
                    attr.name
                )));
            }
        }

        let modes = &self.fourier_modes;
        if modes.xm.len() != modes.mnmax || modes.xn.len() != modes.mnmax {
            return Err(ParityError::SchemaViolation(format!(
                "mode index lengths xm={} xn={} differ from mnmax={}",
                modes.xm.len(),
                modes.xn.len(),
                modes.mnmax
            )));
        }
        let mut seen: HashSet<(i64, i64)> = HashSet::with_capacity(modes.mnmax);
        for (idx, (&m, &n)) in modes.xm.iter().zip(modes.xn.iter()).enumerate() {
            if m < 0 {
                return Err(ParityError::SchemaViolation(format!(
                    "mode[{idx}] requires m >= 0, got {m}"
                )));
            }
            if !seen.insert((m, n)) {
                return Err(ParityError::SchemaViolation(format!(
                    "duplicate mode (m={m}, n={n})"
                )));
            }
        }

        let coeffs = &self.asymmetric_coefficients;
        let ns = coeffs.ns();
        if ns == 0 {
            return Err(ParityError::SchemaViolation(
                "coefficient tables must contain at least one flux surface".to_string(),
            ));
        }
        if eq.iotaf.len() != ns {
            return Err(ParityError::SchemaViolation(format!(
                "iotaf has {} entries, expected ns={ns}",
                eq.iotaf.len()
            )));
        }
        for (name, table) in coeffs.tables() {
            let Some(table) = table else { continue };
            if table.ncols() != modes.mnmax {
                return Err(ParityError::SchemaViolation(format!(
                    "{name} has {} columns, expected mnmax={}",
                    table.ncols(),
                    modes.mnmax
                )));
            }
            if table.nrows() != ns {
                return Err(ParityError::SchemaViolation(format!(
                    "{name} has {} rows, expected ns={ns}",
                    table.nrows()
                )));
            }
            if table.iter().any(|v| !v.is_finite()) {
                return Err(ParityError::SchemaViolation(format!(
                    "{name} contains non-finite coefficients"
                )));
            }
        }
        Ok(())
    }
}
