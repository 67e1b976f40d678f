// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Subject Solver Input
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{ParityError, ParityResult};
use crate::snapshot::ConvergenceResiduals;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Boundary Fourier tables, shape `[mpol, 2*ntor+1]`, indexed `[m, n+ntor]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCoefficients {
    #[serde(with = "crate::matrix_serde")]
    pub rbc: Array2<f64>,
    #[serde(with = "crate::matrix_serde")]
    pub zbs: Array2<f64>,
    #[serde(default, with = "crate::matrix_serde::optional")]
    pub rbs: Option<Array2<f64>>,
    #[serde(default, with = "crate::matrix_serde::optional")]
    pub zbc: Option<Array2<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryBranch {
    Rbc,
    Zbs,
    Rbs,
    Zbc,
}

/// What the subject solver is started with. Read-only to the comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSolverConfig {
    pub lasym: bool,
    pub nfp: u32,
    pub mpol: usize,
    pub ntor: usize,
    /// Final force tolerance the subject run targets, if the input sets one.
    #[serde(default)]
    pub ftol: Option<f64>,
    pub raxis_c: Vec<f64>,
    pub zaxis_s: Vec<f64>,
    #[serde(default)]
    pub raxis_s: Option<Vec<f64>>,
    #[serde(default)]
    pub zaxis_c: Option<Vec<f64>>,
    pub boundary: BoundaryCoefficients,
    /// File the config was loaded from; external runners are handed this path.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl SubjectSolverConfig {
    /// Initial axis R at toroidal angle zero.
    pub fn initial_r(&self) -> f64 {
        self.raxis_c.iter().sum()
    }

    /// Initial axis Z at toroidal angle zero.
    pub fn initial_z(&self) -> f64 {
        self.zaxis_c.as_ref().map_or(0.0, |z| z.iter().sum())
    }

    fn branch(&self, branch: BoundaryBranch) -> Option<&Array2<f64>> {
        match branch {
            BoundaryBranch::Rbc => Some(&self.boundary.rbc),
            BoundaryBranch::Zbs => Some(&self.boundary.zbs),
            BoundaryBranch::Rbs => self.boundary.rbs.as_ref(),
            BoundaryBranch::Zbc => self.boundary.zbc.as_ref(),
        }
    }

    /// Coefficient for poloidal mode `m` and toroidal mode `n` (VMEC's `RBC(n,m)`).
    pub fn boundary_value(&self, branch: BoundaryBranch, m: usize, n: i64) -> Option<f64> {
        let table = self.branch(branch)?;
        let col = n + self.ntor as i64;
        if col < 0 {
            return None;
        }
        table.get((m, col as usize)).copied()
    }

    /// Nonzero `(m, n, value)` entries of a boundary table, row-major.
    pub fn nonzero_entries(&self, branch: BoundaryBranch) -> Vec<(usize, i64, f64)> {
        let Some(table) = self.branch(branch) else {
            return Vec::new();
        };
        let ntor = self.ntor as i64;
        table
            .indexed_iter()
            .filter(|(_, v)| **v != 0.0)
            .map(|((m, col), v)| (m, col as i64 - ntor, *v))
            .collect()
    }

    pub fn validate(&self) -> ParityResult<()> {
        if self.nfp < 1 {
            return Err(ParityError::InvalidInput("nfp must be >= 1".to_string()));
        }
        let n_axis = self.ntor + 1;
        let n_cols = 2 * self.ntor + 1;
        let axis_arrays = [
            ("raxis_c", Some(&self.raxis_c)),
            ("zaxis_s", Some(&self.zaxis_s)),
            ("raxis_s", self.raxis_s.as_ref()),
            ("zaxis_c", self.zaxis_c.as_ref()),
        ];
        for (name, values) in axis_arrays {
            let Some(values) = values else { continue };
            if values.len() != n_axis {
                return Err(ParityError::InvalidInput(format!(
                    "{name} has {} entries, expected ntor+1={n_axis}",
                    values.len()
                )));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ParityError::InvalidInput(format!(
                    "{name} contains non-finite values"
                )));
            }
        }
        let tables = [
            ("rbc", Some(&self.boundary.rbc)),
            ("zbs", Some(&self.boundary.zbs)),
            ("rbs", self.boundary.rbs.as_ref()),
            ("zbc", self.boundary.zbc.as_ref()),
        ];
        for (name, table) in tables {
            let Some(table) = table else { continue };
            if table.dim() != (self.mpol, n_cols) {
                return Err(ParityError::InvalidInput(format!(
                    "{name} has shape {:?}, expected ({}, {n_cols})",
                    table.dim(),
                    self.mpol
                )));
            }
            if table.iter().any(|v| !v.is_finite()) {
                return Err(ParityError::InvalidInput(format!(
                    "{name} contains non-finite values"
                )));
            }
        }
        let has_asym_data = self.raxis_s.is_some()
            || self.zaxis_c.is_some()
            || self.boundary.rbs.is_some()
            || self.boundary.zbc.is_some();
        if !self.lasym && has_asym_data {
            return Err(ParityError::InvalidInput(
                "antisymmetric arrays present but lasym is false".to_string(),
            ));
        }
        if let Some(ftol) = self.ftol {
            if !(ftol.is_finite() && ftol > 0.0) {
                return Err(ParityError::InvalidInput(format!(
                    "ftol must be finite and > 0, got {ftol}"
                )));
            }
        }
        Ok(())
    }
}

/// What a successful subject run reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRunResult {
    pub residuals: ConvergenceResiduals,
    #[serde(default)]
    pub iterations: Option<usize>,
}
