// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — netCDF Output Reader
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! `wout_*.nc` files as written by the reference solver.
//!
//! Numeric global attributes become [`GlobalAttribute`]s; text attributes
//! are skipped. Every numeric variable is read through the netCDF library's
//! conversion to f64. Character variables (`version_`, `mgrid_file`, ...)
//! are listed but fail to read as numbers.

use crate::reader::{NamedVariableStore, VariableInfo};
use log::debug;
use ndarray::{ArrayD, IxDyn};
use netcdf::AttrValue;
use parity_types::error::{ParityError, ParityResult};
use parity_types::snapshot::GlobalAttribute;
use std::path::Path;

fn numeric_attribute(value: AttrValue) -> Option<f64> {
    match value {
        AttrValue::Double(v) => Some(v),
        AttrValue::Float(v) => Some(f64::from(v)),
        AttrValue::Int(v) => Some(f64::from(v)),
        AttrValue::Short(v) => Some(f64::from(v)),
        AttrValue::Longlong(v) => Some(v as f64),
        AttrValue::Doubles(v) if v.len() == 1 => v.first().copied(),
        AttrValue::Floats(v) if v.len() == 1 => v.first().map(|x| f64::from(*x)),
        AttrValue::Ints(v) if v.len() == 1 => v.first().map(|x| f64::from(*x)),
        _ => None,
    }
}

/// File-backed store over a netCDF file.
pub struct NetcdfContainer {
    path: String,
    file: Option<netcdf::File>,
}

impl NetcdfContainer {
    /// Fails with `ResourceNotFound` if `path` is not a file and
    /// `MalformedContainer` if the netCDF library cannot open it.
    pub fn open(path: impl AsRef<Path>) -> ParityResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        if !path.is_file() {
            return Err(ParityError::ResourceNotFound { path: display });
        }
        let file = netcdf::open(path).map_err(|e| ParityError::MalformedContainer {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        debug!("opened netCDF container '{display}'");
        Ok(NetcdfContainer {
            path: display,
            file: Some(file),
        })
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn file(&self) -> ParityResult<&netcdf::File> {
        self.file.as_ref().ok_or(ParityError::ContainerClosed)
    }
}

impl NamedVariableStore for NetcdfContainer {
    fn source(&self) -> &str {
        &self.path
    }

    fn global_attributes(&mut self) -> ParityResult<Vec<GlobalAttribute>> {
        let file = self.file()?;
        let mut attributes = Vec::new();
        for attr in file.attributes() {
            let name = attr.name().to_string();
            let value = attr.value().map_err(|e| ParityError::MalformedContainer {
                path: self.path.clone(),
                reason: format!("attribute '{name}': {e}"),
            })?;
            match numeric_attribute(value) {
                Some(value) => attributes.push(GlobalAttribute { name, value }),
                None => debug!("skipping non-numeric attribute '{name}'"),
            }
        }
        Ok(attributes)
    }

    fn variables(&mut self) -> ParityResult<Vec<VariableInfo>> {
        let file = self.file()?;
        Ok(file
            .variables()
            .map(|var| VariableInfo {
                name: var.name().to_string(),
                shape: var.dimensions().iter().map(|d| d.len()).collect(),
            })
            .collect())
    }

    fn read_raw(&mut self, name: &str) -> ParityResult<ArrayD<f64>> {
        let file = self.file()?;
        let var = file
            .variable(name)
            .ok_or_else(|| ParityError::FieldNotFound {
                name: name.to_string(),
            })?;
        debug!("reading '{name}' from '{}'", self.path);
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let mut buffer = vec![0.0f64; shape.iter().product()];
        var.values_to(&mut buffer, None, None)
            .map_err(|e| ParityError::MalformedContainer {
                path: self.path.clone(),
                reason: format!("variable '{name}' is not numeric: {e}"),
            })?;
        ArrayD::from_shape_vec(IxDyn(&shape), buffer).map_err(|e| {
            ParityError::MalformedContainer {
                path: self.path.clone(),
                reason: format!("variable '{name}': {e}"),
            }
        })
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!("closed container '{}'", self.path);
        }
    }
}

impl Drop for NetcdfContainer {
    fn drop(&mut self) {
        self.close();
    }
}
