// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — End-to-End Pipeline Tests for parity-core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Container on disk → snapshot document → comparison report.

use ndarray::{arr0, array, Array2};
use ndarray_npy::NpzWriter;
use parity_core::compare::compare;
use parity_core::extract::{extract_from_path, read_snapshot, serialize, write_snapshot};
use parity_core::input::parse_indata;
use parity_core::report::Finding;
use parity_core::runner::{FailureKind, SubjectRunError};
use parity_types::config::ComparatorConfig;
use parity_types::constants::RECOVERY_FINDING;
use parity_types::error::ParityError;
use parity_types::subject::{SubjectRunResult, SubjectSolverConfig};
use std::fs::File;
use std::path::{Path, PathBuf};

const SYMMETRIC_FIELDS: &[&str] = &[
    "raxis_cc", "zaxis_cs", "fsqr", "fsqz", "fsql", "aspect", "volume_p", "wb", "betatotal",
    "betapol", "betator", "iotaf", "mnmax", "xm", "xn", "rmnc", "zmns",
];

/// Writes a three-surface, three-mode reference run. `skip` members are left out.
fn write_wout(dir: &Path, name: &str, asymmetric: bool, skip: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    let add_scalar = |npz: &mut NpzWriter<File>, key: &str, v: f64| {
        if !skip.contains(&key) {
            npz.add_array(key, &arr0(v)).unwrap();
        }
    };
    add_scalar(&mut npz, "@ns", 3.0);
    add_scalar(&mut npz, "@nfp", 1.0);
    add_scalar(&mut npz, "fsqr", 7.3e-13);
    add_scalar(&mut npz, "fsqz", 2.9e-13);
    add_scalar(&mut npz, "fsql", 1.1e-13);
    add_scalar(&mut npz, "aspect", 10.000_000_000_000_2);
    add_scalar(&mut npz, "volume_p", 42.631_875_210_5);
    add_scalar(&mut npz, "wb", 0.051_234_567_890_123);
    add_scalar(&mut npz, "betatotal", 0.012_3);
    add_scalar(&mut npz, "betapol", 0.314_159);
    add_scalar(&mut npz, "betator", 0.012_7);

    let vectors: Vec<(&str, ndarray::Array1<f64>)> = vec![
        ("raxis_cc", array![0.998765]),
        ("zaxis_cs", array![0.0]),
        ("iotaf", array![0.95, 0.9, 0.8]),
        ("xm", array![0.0, 1.0, 2.0]),
        ("xn", array![0.0, 0.0, 0.0]),
    ];
    for (key, v) in &vectors {
        if !skip.contains(key) {
            npz.add_array(*key, v).unwrap();
        }
    }
    if !skip.contains(&"mnmax") {
        npz.add_array("mnmax", &arr0(3i32)).unwrap();
    }
    let rmnc = Array2::from_shape_fn((3, 3), |(s, m)| 6.0 / (1.0 + s as f64 + 10.0 * m as f64));
    let zmns = Array2::from_shape_fn((3, 3), |(s, m)| 0.6 * (s * m) as f64 / 3.0);
    for (key, t) in [("rmnc", &rmnc), ("zmns", &zmns)] {
        if !skip.contains(&key) {
            npz.add_array(key, t).unwrap();
        }
    }
    if asymmetric {
        npz.add_array("raxis_cs", &array![0.0]).unwrap();
        npz.add_array("zaxis_cc", &array![0.000_123]).unwrap();
        npz.add_array("rmns", &Array2::from_elem((3, 3), 0.189_737 / 3.0))
            .unwrap();
        npz.add_array("zmnc", &Array2::from_elem((3, 3), -0.01)).unwrap();
        npz.add_array("lmns", &Array2::from_elem((3, 3), 1.0 / 3.0))
            .unwrap();
    }
    npz.finish().unwrap();
    path
}

const SUBJECT_INPUT: &str = "\
&INDATA
  LASYM = T
  NFP = 1
  MPOL = 3
  NTOR = 0
  FTOL_ARRAY = 1.0E-11
  RAXIS_CC = 0.0
  ZAXIS_CS = 0.0
  RBC(0,0) = 6.0
  RBC(0,1) = 0.6
  ZBS(0,1) = 0.6
  RBS(0,1) = 0.189737
/
";

fn jacobian_runner(_: &SubjectSolverConfig) -> Result<SubjectRunResult, SubjectRunError> {
    Err(SubjectRunError::JacobianDegeneracy {
        iteration: Some(1),
        detail: "INITIAL JACOBIAN CHANGED SIGN!".to_string(),
    })
}

#[test]
fn test_asymmetric_pipeline_asserts_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let wout = write_wout(dir.path(), "wout_asym.npz", true, &[]);
    let snapshot = extract_from_path(&wout).unwrap();
    assert_eq!(snapshot.provenance.attributes.len(), 2);
    assert!(snapshot.asymmetric_coefficients.has_asymmetric_branch());

    let doc = dir.path().join("snapshot.json");
    write_snapshot(&snapshot, &doc).unwrap();
    let reloaded = read_snapshot(&doc).unwrap();
    assert_eq!(reloaded, snapshot);

    let subject = parse_indata(SUBJECT_INPUT).unwrap();
    let report = compare(
        &reloaded,
        &subject,
        ComparatorConfig::default(),
        &mut jacobian_runner,
    )
    .unwrap();
    assert!(report.axis_comparison.mismatch);
    assert!(report.reference.converged);
    assert_eq!(
        report.subject_run.failure(),
        Some(&FailureKind::JacobianDegeneracy)
    );
    assert_eq!(report.finding, Finding::ReferenceRecoversSubjectDoesNot);
    assert!(report.narrative.iter().any(|l| l.contains(RECOVERY_FINDING)));
}

#[test]
fn test_double_extraction_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let wout = write_wout(dir.path(), "wout_asym.npz", true, &[]);
    let first = serialize(&extract_from_path(&wout).unwrap()).unwrap();
    let second = serialize(&extract_from_path(&wout).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_full_precision_survives_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let wout = write_wout(dir.path(), "wout_sym.npz", false, &[]);
    let snapshot = extract_from_path(&wout).unwrap();
    let doc = dir.path().join("snapshot.json");
    write_snapshot(&snapshot, &doc).unwrap();
    let reloaded = read_snapshot(&doc).unwrap();
    assert_eq!(
        reloaded.equilibrium.wmhd.to_bits(),
        0.051_234_567_890_123f64.to_bits()
    );
    assert_eq!(
        reloaded.equilibrium.aspect.to_bits(),
        10.000_000_000_000_2f64.to_bits()
    );
}

#[test]
fn test_symmetric_container_yields_null_branches() {
    let dir = tempfile::tempdir().unwrap();
    let wout = write_wout(dir.path(), "wout_sym.npz", false, &[]);
    let snapshot = extract_from_path(&wout).unwrap();
    assert!(snapshot.final_axis.raxis_cs.is_none());
    assert!(snapshot.asymmetric_coefficients.rmns.is_none());
    assert!(snapshot.asymmetric_coefficients.lmns.is_none());

    let text = String::from_utf8(serialize(&snapshot).unwrap()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(value["asymmetric_coefficients"]["rmns"].is_null());
    assert!(value["final_axis"]["zaxis_cc"].is_null());
}

#[test]
fn test_every_required_field_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    for field in SYMMETRIC_FIELDS {
        let wout = write_wout(dir.path(), &format!("wout_no_{field}.npz"), true, &[*field]);
        match extract_from_path(&wout) {
            Err(ParityError::IncompleteReferenceData { field: missing }) => {
                assert_eq!(missing, *field)
            }
            other => panic!("Expected IncompleteReferenceData for {field}, got {other:?}"),
        }
    }
}

#[test]
fn test_missing_and_unversioned_inputs() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        extract_from_path(dir.path().join("absent.npz")),
        Err(ParityError::ResourceNotFound { .. })
    ));
    assert!(matches!(
        read_snapshot(dir.path().join("absent.json")),
        Err(ParityError::ResourceNotFound { .. })
    ));

    let wout = write_wout(dir.path(), "wout_sym.npz", false, &[]);
    let bytes = serialize(&extract_from_path(&wout).unwrap()).unwrap();
    let mut doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    doc["version"] = serde_json::json!(2);
    let future = dir.path().join("future.json");
    std::fs::write(&future, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
    assert!(matches!(
        read_snapshot(&future),
        Err(ParityError::UnsupportedSnapshotVersion { found: 2, .. })
    ));
}

#[test]
fn test_converged_subject_with_matching_guess() {
    let dir = tempfile::tempdir().unwrap();
    let wout = write_wout(dir.path(), "wout_asym.npz", true, &[]);
    let snapshot = extract_from_path(&wout).unwrap();
    let text = SUBJECT_INPUT
        .replace("RAXIS_CC = 0.0", "RAXIS_CC = 0.998765")
        .replace("ZAXIS_CS = 0.0", "ZAXIS_CS = 0.0\n  ZAXIS_CC = 0.000123");
    let subject = parse_indata(&text).unwrap();
    let mut runner = |_: &SubjectSolverConfig| -> Result<SubjectRunResult, SubjectRunError> {
        Ok(SubjectRunResult {
            residuals: snapshot.convergence,
            iterations: Some(850),
        })
    };
    let report = compare(&snapshot, &subject, ComparatorConfig::default(), &mut runner).unwrap();
    assert!(!report.axis_comparison.mismatch);
    assert_eq!(report.finding, Finding::BothConverged);
    assert!(!report.asserts_recovery());
}
