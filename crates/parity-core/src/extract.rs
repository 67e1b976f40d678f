// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Reference Snapshot Extractor
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Reduces a reference `wout` container to an [`EquilibriumSnapshot`] and
//! (de)serializes the versioned interchange document.
//!
//! Required fields that are missing abort with `IncompleteReferenceData`.
//! Optional fields (antisymmetric axis and coefficient branches, lambda)
//! become `None` on `FieldNotFound`; every other read error still aborts.

use crate::reader::{open_container, NamedVariableStore};
use log::{debug, info, warn};
use parity_types::constants::SNAPSHOT_VERSION;
use parity_types::error::{ParityError, ParityResult};
use parity_types::snapshot::{
    AsymmetricCoefficients, AxisGeometry, ConvergenceResiduals, EquilibriumScalars,
    EquilibriumSnapshot, FourierModeIndex, SnapshotProvenance,
};
use serde_json::Value;
use std::path::Path;

fn required<T>(field: &str, read: ParityResult<T>) -> ParityResult<T> {
    read.map_err(|e| {
        if e.is_field_not_found() {
            ParityError::IncompleteReferenceData {
                field: field.to_string(),
            }
        } else {
            e
        }
    })
}

fn optional<T>(field: &str, read: ParityResult<T>) -> ParityResult<Option<T>> {
    match read {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_field_not_found() => {
            debug!("optional field '{field}' absent");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn to_mode_numbers(name: &str, values: &[f64]) -> ParityResult<Vec<i64>> {
    values
        .iter()
        .enumerate()
        .map(|(idx, &v)| {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i64)
            } else {
                Err(ParityError::SchemaViolation(format!(
                    "{name}[{idx}] is not an integer mode number: {v}"
                )))
            }
        })
        .collect()
}

fn read_required_vec<S>(store: &mut S, name: &str) -> ParityResult<Vec<f64>>
where
    S: NamedVariableStore + ?Sized,
{
    required(name, store.read_vector(name)).map(|v| v.to_vec())
}

fn read_optional_vec<S>(store: &mut S, name: &str) -> ParityResult<Option<Vec<f64>>>
where
    S: NamedVariableStore + ?Sized,
{
    optional(name, store.read_vector(name)).map(|v| v.map(|a| a.to_vec()))
}

fn read_required_scalar<S>(store: &mut S, name: &str) -> ParityResult<f64>
where
    S: NamedVariableStore + ?Sized,
{
    required(name, store.read_scalar(name))
}

/// Walks the fixed field schema over an open store.
///
/// The store is borrowed, not closed; see [`extract_from_path`] for the
/// scoped open/extract/close sequence.
pub fn extract<S>(store: &mut S) -> ParityResult<EquilibriumSnapshot>
where
    S: NamedVariableStore + ?Sized,
{
    let provenance = SnapshotProvenance {
        source: store.source().to_string(),
        attributes: store.global_attributes()?,
    };

    let final_axis = AxisGeometry {
        raxis_cc: read_required_vec(store, "raxis_cc")?,
        zaxis_cs: read_required_vec(store, "zaxis_cs")?,
        raxis_cs: read_optional_vec(store, "raxis_cs")?,
        zaxis_cc: read_optional_vec(store, "zaxis_cc")?,
    };

    let convergence = ConvergenceResiduals {
        fsqr: read_required_scalar(store, "fsqr")?,
        fsqz: read_required_scalar(store, "fsqz")?,
        fsql: read_required_scalar(store, "fsql")?,
    };

    let equilibrium = EquilibriumScalars {
        aspect: read_required_scalar(store, "aspect")?,
        volume: read_required_scalar(store, "volume_p")?,
        wmhd: read_required_scalar(store, "wb")?,
        betatotal: read_required_scalar(store, "betatotal")?,
        betapol: read_required_scalar(store, "betapol")?,
        betator: read_required_scalar(store, "betator")?,
        iotaf: read_required_vec(store, "iotaf")?,
    };

    let mnmax_raw = read_required_scalar(store, "mnmax")?;
    if !(mnmax_raw.is_finite() && mnmax_raw >= 0.0 && mnmax_raw.fract() == 0.0) {
        return Err(ParityError::SchemaViolation(format!(
            "mnmax must be a non-negative integer, got {mnmax_raw}"
        )));
    }
    let fourier_modes = FourierModeIndex {
        mnmax: mnmax_raw as usize,
        xm: to_mode_numbers("xm", &read_required_vec(store, "xm")?)?,
        xn: to_mode_numbers("xn", &read_required_vec(store, "xn")?)?,
    };

    let asymmetric_coefficients = AsymmetricCoefficients {
        rmnc: required("rmnc", store.read_matrix("rmnc"))?,
        zmns: required("zmns", store.read_matrix("zmns"))?,
        rmns: optional("rmns", store.read_matrix("rmns"))?,
        zmnc: optional("zmnc", store.read_matrix("zmnc"))?,
        lmns: optional("lmns", store.read_matrix("lmns"))?,
    };

    let snapshot = EquilibriumSnapshot {
        version: SNAPSHOT_VERSION,
        provenance,
        final_axis,
        convergence,
        equilibrium,
        fourier_modes,
        asymmetric_coefficients,
    };
    snapshot.validate()?;
    log_summary(&snapshot);
    Ok(snapshot)
}

fn log_summary(snapshot: &EquilibriumSnapshot) {
    info!(
        "reference axis at phi=0: R={:.6}, Z={:.6}",
        snapshot.final_axis.r_at_origin(),
        snapshot.final_axis.z_at_origin()
    );
    info!(
        "convergence: fsqr={:.2e}, fsqz={:.2e}, fsql={:.2e}",
        snapshot.convergence.fsqr, snapshot.convergence.fsqz, snapshot.convergence.fsql
    );
    info!(
        "equilibrium: aspect={:.3}, volume={:.3}, {} Fourier modes on {} surfaces",
        snapshot.equilibrium.aspect,
        snapshot.equilibrium.volume,
        snapshot.fourier_modes.mnmax,
        snapshot.asymmetric_coefficients.ns()
    );
    let coeffs = &snapshot.asymmetric_coefficients;
    if coeffs.rmns.is_some() {
        info!("antisymmetric R coefficients (rmns) present");
    }
    if coeffs.zmnc.is_some() {
        info!("antisymmetric Z coefficients (zmnc) present");
    }
    if !coeffs.has_asymmetric_branch() && snapshot.final_axis.is_asymmetric() {
        warn!("axis has antisymmetric components but rmns/zmnc are absent");
    }
}

/// Opens the container at `path`, extracts, and closes the handle on both
/// success and failure.
pub fn extract_from_path(path: impl AsRef<Path>) -> ParityResult<EquilibriumSnapshot> {
    let mut container = open_container(path)?;
    let result = extract(container.as_mut());
    container.close();
    result
}

/// Pretty JSON, struct field order, shortest round-trip float formatting.
pub fn serialize(snapshot: &EquilibriumSnapshot) -> ParityResult<Vec<u8>> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(ParityError::UnsupportedSnapshotVersion {
            found: u64::from(snapshot.version),
            supported: SNAPSHOT_VERSION,
        });
    }
    snapshot.validate()?;
    let mut bytes = serde_json::to_vec_pretty(snapshot)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Inverse of [`serialize`]. The version is checked before the body is
/// interpreted, so a future layout fails as a version error, not a parse error.
pub fn deserialize(bytes: &[u8]) -> ParityResult<EquilibriumSnapshot> {
    let document: Value = serde_json::from_slice(bytes)?;
    let version = document
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            ParityError::SchemaViolation(
                "snapshot document has no integer 'version' field".to_string(),
            )
        })?;
    if version != u64::from(SNAPSHOT_VERSION) {
        return Err(ParityError::UnsupportedSnapshotVersion {
            found: version,
            supported: SNAPSHOT_VERSION,
        });
    }
    let snapshot: EquilibriumSnapshot = serde_json::from_value(document)?;
    snapshot.validate()?;
    Ok(snapshot)
}

pub fn write_snapshot(snapshot: &EquilibriumSnapshot, path: impl AsRef<Path>) -> ParityResult<()> {
    let bytes = serialize(snapshot)?;
    std::fs::write(path.as_ref(), bytes)?;
    info!("snapshot written to '{}'", path.as_ref().display());
    Ok(())
}

pub fn read_snapshot(path: impl AsRef<Path>) -> ParityResult<EquilibriumSnapshot> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ParityError::ResourceNotFound {
            path: path.display().to_string(),
        },
        _ => ParityError::Io(e),
    })?;
    deserialize(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemoryStore;
    use ndarray::Array2;

    fn symmetric_store() -> MemoryStore {
        MemoryStore::new("memory:symmetric")
            .with_attribute("ns", 3.0)
            .with_vector("raxis_cc", vec![0.998765])
            .with_vector("zaxis_cs", vec![0.0])
            .with_scalar("fsqr", 3.1e-12)
            .with_scalar("fsqz", 1.2e-12)
            .with_scalar("fsql", 4.4e-13)
            .with_scalar("aspect", 3.3)
            .with_scalar("volume_p", 1.93)
            .with_scalar("wb", 0.041)
            .with_scalar("betatotal", 0.0123)
            .with_scalar("betapol", 0.31)
            .with_scalar("betator", 0.0127)
            .with_vector("iotaf", vec![0.92, 0.85, 0.77])
            .with_scalar("mnmax", 3.0)
            .with_vector("xm", vec![0.0, 1.0, 2.0])
            .with_vector("xn", vec![0.0, 0.0, 0.0])
            .with_matrix(
                "rmnc",
                Array2::from_shape_fn((3, 3), |(s, m)| 1.0 / (1.0 + (s + m) as f64)),
            )
            .with_matrix(
                "zmns",
                Array2::from_shape_fn((3, 3), |(s, m)| 0.1 * (s * m) as f64),
            )
    }

    fn asymmetric_store() -> MemoryStore {
        symmetric_store()
            .with_vector("raxis_cs", vec![0.0])
            .with_vector("zaxis_cc", vec![0.0123])
            .with_matrix("rmns", Array2::from_elem((3, 3), 0.02))
            .with_matrix("zmnc", Array2::from_elem((3, 3), -0.01))
            .with_matrix("lmns", Array2::from_elem((3, 3), 0.003))
    }

    #[test]
    fn test_symmetric_run_yields_null_branches() {
        let snap = extract(&mut symmetric_store()).unwrap();
        assert!(snap.final_axis.raxis_cs.is_none());
        assert!(snap.final_axis.zaxis_cc.is_none());
        assert!(snap.asymmetric_coefficients.rmns.is_none());
        assert!(snap.asymmetric_coefficients.zmnc.is_none());
        assert!(snap.asymmetric_coefficients.lmns.is_none());
        assert_eq!(snap.fourier_modes.xm, vec![0, 1, 2]);
        assert_eq!(snap.provenance.source, "memory:symmetric");
        assert_eq!(snap.provenance.attributes.len(), 1);
    }

    #[test]
    fn test_asymmetric_run_populates_branches() {
        let snap = extract(&mut asymmetric_store()).unwrap();
        assert!(snap.final_axis.is_asymmetric());
        assert!(snap.asymmetric_coefficients.has_asymmetric_branch());
        assert!(snap.asymmetric_coefficients.lmns.is_some());
    }

    #[test]
    fn test_only_the_absent_optional_branch_is_null() {
        let mut store = asymmetric_store();
        store.remove("lmns");
        let snap = extract(&mut store).unwrap();
        assert!(snap.asymmetric_coefficients.lmns.is_none());
        assert!(snap.asymmetric_coefficients.rmns.is_some());
        assert!(snap.asymmetric_coefficients.zmnc.is_some());
        assert_eq!(snap.final_axis.zaxis_cc, Some(vec![0.0123]));
    }

    #[test]
    fn test_missing_required_field_is_incomplete() {
        let mut store = asymmetric_store();
        store.remove("fsqr");
        match extract(&mut store).expect_err("missing fsqr must fail") {
            ParityError::IncompleteReferenceData { field } => assert_eq!(field, "fsqr"),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_shape_optional_field_is_not_swallowed() {
        let store = symmetric_store().with_vector("rmns", vec![1.0, 2.0, 3.0]);
        let err = extract(&mut store.clone()).expect_err("1-D rmns must fail");
        assert!(matches!(err, ParityError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_schema_violation_on_short_xn() {
        let store = symmetric_store().with_vector("xn", vec![0.0, 0.0]);
        let err = extract(&mut store.clone()).expect_err("short xn must fail");
        assert!(matches!(err, ParityError::SchemaViolation(_)));
    }

    #[test]
    fn test_non_integer_mode_number_rejected() {
        let store = symmetric_store().with_vector("xm", vec![0.0, 1.5, 2.0]);
        let err = extract(&mut store.clone()).expect_err("fractional xm must fail");
        match err {
            ParityError::SchemaViolation(msg) => assert!(msg.contains("xm[1]")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_serialize_roundtrip_and_version_gate() {
        let snap = extract(&mut asymmetric_store()).unwrap();
        let bytes = serialize(&snap).unwrap();
        assert_eq!(deserialize(&bytes).unwrap(), snap);

        let mut doc: Value = serde_json::from_slice(&bytes).unwrap();
        doc["version"] = Value::from(SNAPSHOT_VERSION + 1);
        let err = deserialize(&serde_json::to_vec(&doc).unwrap()).expect_err("future version");
        match err {
            ParityError::UnsupportedSnapshotVersion { found, supported } => {
                assert_eq!(found, u64::from(SNAPSHOT_VERSION + 1));
                assert_eq!(supported, SNAPSHOT_VERSION);
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_document_field_order_is_fixed() {
        let bytes = serialize(&extract(&mut symmetric_store()).unwrap()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let order = [
            "\"version\"",
            "\"provenance\"",
            "\"final_axis\"",
            "\"convergence\"",
            "\"equilibrium\"",
            "\"fourier_modes\"",
            "\"asymmetric_coefficients\"",
        ];
        let positions: Vec<usize> = order.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("\"rmns\": null"));
    }

    #[test]
    fn test_missing_version_is_schema_violation() {
        let err = deserialize(b"{\"final_axis\": {}}").expect_err("no version");
        assert!(matches!(err, ParityError::SchemaViolation(_)));
    }
}
