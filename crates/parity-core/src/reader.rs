// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Structured Output Reader
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Named-variable access to reference solver output.
//!
//! Two file-backed stores exist. The reference solver's own `wout_*.nc`
//! files are read by `NetcdfContainer` when the `netcdf` feature is on.
//! A NumPy `.npz` archive holding the same variables, one member per
//! variable, is always available. In an archive, members whose name starts
//! with `@` carry numeric global attributes, and element types
//! f64/f32/i64/i32 are widened to f64 on read.

use log::debug;
use ndarray::{Array1, Array2, ArrayD, Ix2, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, ReadNpzError, ReadableElement};
use parity_types::constants::ATTRIBUTE_PREFIX;
use parity_types::error::{ParityError, ParityResult};
use parity_types::snapshot::GlobalAttribute;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

/// A value read from the container, by dimensionality.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Vector(Array1<f64>),
    Matrix(Array2<f64>),
}

impl ArrayValue {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            ArrayValue::Vector(v) => vec![v.len()],
            ArrayValue::Matrix(m) => vec![m.nrows(), m.ncols()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub name: String,
    pub shape: Vec<usize>,
}

/// Handle over a container of uniquely named numeric entries.
///
/// Implementors supply raw n-d access; the typed reads are shared.
/// A missing name must surface as [`ParityError::FieldNotFound`].
pub trait NamedVariableStore {
    /// Human-readable origin, recorded in snapshot provenance.
    fn source(&self) -> &str;

    fn global_attributes(&mut self) -> ParityResult<Vec<GlobalAttribute>>;

    fn variables(&mut self) -> ParityResult<Vec<VariableInfo>>;

    fn read_raw(&mut self, name: &str) -> ParityResult<ArrayD<f64>>;

    /// Release underlying resources. Safe to call more than once.
    fn close(&mut self);

    /// 0-d or single-element arrays.
    fn read_scalar(&mut self, name: &str) -> ParityResult<f64> {
        let raw = self.read_raw(name)?;
        match (raw.ndim(), raw.iter().next()) {
            (0 | 1, Some(value)) if raw.len() == 1 => Ok(*value),
            _ => Err(ParityError::ShapeMismatch {
                name: name.to_string(),
                expected: "scalar",
                found: raw.shape().to_vec(),
            }),
        }
    }

    fn read_array(&mut self, name: &str) -> ParityResult<ArrayValue> {
        let raw = self.read_raw(name)?;
        match raw.ndim() {
            0 | 1 => Ok(ArrayValue::Vector(raw.iter().copied().collect())),
            2 => {
                let matrix = raw.into_dimensionality::<Ix2>().map_err(|e| {
                    ParityError::MalformedContainer {
                        path: self.source().to_string(),
                        reason: format!("variable '{name}': {e}"),
                    }
                })?;
                Ok(ArrayValue::Matrix(matrix))
            }
            _ => Err(ParityError::ShapeMismatch {
                name: name.to_string(),
                expected: "1-D or 2-D",
                found: raw.shape().to_vec(),
            }),
        }
    }

    fn read_vector(&mut self, name: &str) -> ParityResult<Array1<f64>> {
        match self.read_array(name)? {
            ArrayValue::Vector(v) => Ok(v),
            ArrayValue::Matrix(m) => Err(ParityError::ShapeMismatch {
                name: name.to_string(),
                expected: "1-D",
                found: vec![m.nrows(), m.ncols()],
            }),
        }
    }

    fn read_matrix(&mut self, name: &str) -> ParityResult<Array2<f64>> {
        match self.read_array(name)? {
            ArrayValue::Matrix(m) => Ok(m),
            ArrayValue::Vector(v) => Err(ParityError::ShapeMismatch {
                name: name.to_string(),
                expected: "2-D",
                found: vec![v.len()],
            }),
        }
    }
}

fn member_stem(member: &str) -> &str {
    member.strip_suffix(".npy").unwrap_or(member)
}

fn read_typed<A: ReadableElement>(
    npz: &mut NpzReader<File>,
    stem: &str,
) -> Result<ArrayD<A>, ReadNpzError> {
    npz.by_name::<OwnedRepr<A>, IxDyn>(&format!("{stem}.npy"))
        .or_else(|_| npz.by_name::<OwnedRepr<A>, IxDyn>(stem))
}

/// File-backed store over an `.npz` archive.
pub struct NpzContainer {
    path: String,
    reader: Option<NpzReader<File>>,
    members: Vec<String>,
}

impl NpzContainer {
    /// Fails with `ResourceNotFound` if `path` does not resolve to a file and
    /// `MalformedContainer` if it is not a readable archive.
    pub fn open(path: impl AsRef<Path>) -> ParityResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ParityError::ResourceNotFound {
                path: display.clone(),
            },
            _ => ParityError::Io(e),
        })?;
        if !path.is_file() {
            return Err(ParityError::ResourceNotFound { path: display });
        }
        let mut npz = NpzReader::new(file).map_err(|e| ParityError::MalformedContainer {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let members = npz.names().map_err(|e| ParityError::MalformedContainer {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        debug!("opened container '{display}' with {} members", members.len());
        Ok(NpzContainer {
            path: display,
            reader: Some(npz),
            members,
        })
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn ensure_open(&self) -> ParityResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ParityError::ContainerClosed)
        }
    }

    fn member_names(&self, attributes: bool) -> Vec<String> {
        self.members
            .iter()
            .map(|m| member_stem(m))
            .filter(|stem| stem.starts_with(ATTRIBUTE_PREFIX) == attributes)
            .map(str::to_string)
            .collect()
    }

    fn read_member(&mut self, stem: &str) -> ParityResult<ArrayD<f64>> {
        let path = self.path.clone();
        let npz = self.reader.as_mut().ok_or(ParityError::ContainerClosed)?;
        if let Ok(a) = read_typed::<f64>(npz, stem) {
            return Ok(a);
        }
        if let Ok(a) = read_typed::<f32>(npz, stem) {
            return Ok(a.mapv(f64::from));
        }
        if let Ok(a) = read_typed::<i64>(npz, stem) {
            return Ok(a.mapv(|v| v as f64));
        }
        read_typed::<i32>(npz, stem)
            .map(|a| a.mapv(f64::from))
            .map_err(|e| ParityError::MalformedContainer {
                path,
                reason: format!("member '{stem}' is not a supported numeric array: {e}"),
            })
    }
}

impl NamedVariableStore for NpzContainer {
    fn source(&self) -> &str {
        &self.path
    }

    fn global_attributes(&mut self) -> ParityResult<Vec<GlobalAttribute>> {
        self.ensure_open()?;
        let mut attributes = Vec::new();
        for stem in self.member_names(true) {
            let raw = self.read_member(&stem)?;
            let name = stem.trim_start_matches(ATTRIBUTE_PREFIX).to_string();
            let value = match raw.iter().next() {
                Some(v) if raw.len() == 1 => *v,
                _ => {
                    return Err(ParityError::ShapeMismatch {
                        name,
                        expected: "scalar",
                        found: raw.shape().to_vec(),
                    })
                }
            };
            attributes.push(GlobalAttribute { name, value });
        }
        Ok(attributes)
    }

    fn variables(&mut self) -> ParityResult<Vec<VariableInfo>> {
        self.ensure_open()?;
        let mut out = Vec::new();
        for name in self.member_names(false) {
            let shape = self.read_member(&name)?.shape().to_vec();
            out.push(VariableInfo { name, shape });
        }
        Ok(out)
    }

    fn read_raw(&mut self, name: &str) -> ParityResult<ArrayD<f64>> {
        self.ensure_open()?;
        if name.starts_with(ATTRIBUTE_PREFIX)
            || !self.members.iter().any(|m| member_stem(m) == name)
        {
            return Err(ParityError::FieldNotFound {
                name: name.to_string(),
            });
        }
        debug!("reading '{name}' from '{}'", self.path);
        self.read_member(name)
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("closed container '{}'", self.path);
        }
    }
}

impl Drop for NpzContainer {
    fn drop(&mut self) {
        self.close();
    }
}

/// In-memory store, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    label: String,
    attributes: Vec<GlobalAttribute>,
    entries: Vec<(String, ArrayD<f64>)>,
    closed: bool,
}

impl MemoryStore {
    pub fn new(label: impl Into<String>) -> Self {
        MemoryStore {
            label: label.into(),
            ..MemoryStore::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.push(GlobalAttribute {
            name: name.into(),
            value,
        });
        self
    }

    /// Insert or replace a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: ArrayD<f64>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| n != name);
    }

    pub fn with_scalar(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, ArrayD::from_elem(IxDyn(&[]), value));
        self
    }

    pub fn with_vector(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert(name, Array1::from(values).into_dyn());
        self
    }

    pub fn with_matrix(mut self, name: impl Into<String>, values: Array2<f64>) -> Self {
        self.insert(name, values.into_dyn());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl NamedVariableStore for MemoryStore {
    fn source(&self) -> &str {
        &self.label
    }

    fn global_attributes(&mut self) -> ParityResult<Vec<GlobalAttribute>> {
        if self.closed {
            return Err(ParityError::ContainerClosed);
        }
        Ok(self.attributes.clone())
    }

    fn variables(&mut self) -> ParityResult<Vec<VariableInfo>> {
        if self.closed {
            return Err(ParityError::ContainerClosed);
        }
        Ok(self
            .entries
            .iter()
            .map(|(name, value)| VariableInfo {
                name: name.clone(),
                shape: value.shape().to_vec(),
            })
            .collect())
    }

    fn read_raw(&mut self, name: &str) -> ParityResult<ArrayD<f64>> {
        if self.closed {
            return Err(ParityError::ContainerClosed);
        }
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| ParityError::FieldNotFound {
                name: name.to_string(),
            })
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Everything `inspect` prints about a container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerListing {
    pub source: String,
    pub attributes: Vec<GlobalAttribute>,
    pub variables: Vec<VariableInfo>,
}

fn is_netcdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("nc") || ext.eq_ignore_ascii_case("cdf"))
}

/// Opens a file-backed store, chosen by extension: `.nc`/`.cdf` are netCDF,
/// anything else is read as an `.npz` archive.
pub fn open_container(path: impl AsRef<Path>) -> ParityResult<Box<dyn NamedVariableStore>> {
    let path = path.as_ref();
    if !is_netcdf_path(path) {
        return Ok(Box::new(NpzContainer::open(path)?));
    }
    #[cfg(feature = "netcdf")]
    {
        Ok(Box::new(crate::netcdf_container::NetcdfContainer::open(path)?))
    }
    #[cfg(not(feature = "netcdf"))]
    {
        let display = path.display().to_string();
        if !path.is_file() {
            return Err(ParityError::ResourceNotFound { path: display });
        }
        Err(ParityError::MalformedContainer {
            path: display,
            reason: "netCDF support is not compiled in; rebuild with the 'netcdf' feature"
                .to_string(),
        })
    }
}

/// Opens `path`, lists its metadata and variables, and closes it on every path.
pub fn list_container(path: impl AsRef<Path>) -> ParityResult<ContainerListing> {
    let mut container = open_container(path)?;
    let listing = read_listing(container.as_mut());
    container.close();
    listing
}

fn read_listing(store: &mut dyn NamedVariableStore) -> ParityResult<ContainerListing> {
    Ok(ContainerListing {
        source: store.source().to_string(),
        attributes: store.global_attributes()?,
        variables: store.variables()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, array};
    use ndarray_npy::NpzWriter;

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("wout_fixture.npz");
        let file = File::create(&path).unwrap();
        let mut npz = NpzWriter::new(file);
        npz.add_array("@ns", &arr0(3.0f64)).unwrap();
        npz.add_array("fsqr", &arr0(1.5e-12f64)).unwrap();
        npz.add_array("mnmax", &arr0(2i32)).unwrap();
        npz.add_array("xm", &array![0.0f64, 1.0]).unwrap();
        npz.add_array("rmnc", &array![[1.0f64, 0.1], [1.0, 0.2], [1.0, 0.3]])
            .unwrap();
        npz.add_array("cube", &ArrayD::<f64>::zeros(IxDyn(&[2, 2, 2])))
            .unwrap();
        npz.finish().unwrap();
        path
    }

    #[test]
    fn test_open_missing_path_is_resource_not_found() {
        let err = NpzContainer::open("/nonexistent/wout.npz").err().unwrap();
        assert!(matches!(err, ParityError::ResourceNotFound { .. }));
    }

    #[test]
    fn test_open_garbage_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.npz");
        std::fs::write(&path, b"not a zip archive").unwrap();
        let err = NpzContainer::open(&path).err().unwrap();
        assert!(matches!(err, ParityError::MalformedContainer { .. }));
    }

    #[test]
    fn test_lists_attributes_and_variables_separately() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let listing = list_container(&path).unwrap();
        assert_eq!(
            listing.attributes,
            vec![GlobalAttribute {
                name: "ns".to_string(),
                value: 3.0
            }]
        );
        let names: Vec<&str> = listing.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["fsqr", "mnmax", "xm", "rmnc", "cube"]);
        assert_eq!(listing.variables[3].shape, vec![3, 2]);
        assert_eq!(listing.variables[0].shape, Vec::<usize>::new());
    }

    #[test]
    fn test_typed_reads_and_widening() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = NpzContainer::open(write_fixture(dir.path())).unwrap();
        assert!((c.read_scalar("fsqr").unwrap() - 1.5e-12).abs() < 1e-24);
        assert_eq!(c.read_scalar("mnmax").unwrap(), 2.0);
        assert_eq!(c.read_vector("xm").unwrap(), array![0.0, 1.0]);
        assert_eq!(c.read_matrix("rmnc").unwrap().dim(), (3, 2));
        assert!(matches!(
            c.read_scalar("xm"),
            Err(ParityError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            c.read_array("cube"),
            Err(ParityError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            c.read_array("rmns"),
            Err(ParityError::FieldNotFound { .. })
        ));
        assert!(matches!(
            c.read_scalar("@ns"),
            Err(ParityError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_reads() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = NpzContainer::open(write_fixture(dir.path())).unwrap();
        c.close();
        c.close();
        assert!(!c.is_open());
        assert!(matches!(
            c.read_scalar("fsqr"),
            Err(ParityError::ContainerClosed)
        ));
    }

    #[test]
    fn test_open_container_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_container(write_fixture(dir.path())).unwrap();
        assert!(store.source().ends_with("wout_fixture.npz"));
        assert_eq!(store.read_scalar("mnmax").unwrap(), 2.0);
        store.close();

        let err = open_container(dir.path().join("wout_absent.nc")).err().unwrap();
        assert!(matches!(err, ParityError::ResourceNotFound { .. }));
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn test_netcdf_without_backend_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wout_tok_asym.nc");
        std::fs::write(&path, b"CDF\x01").unwrap();
        match open_container(&path).err().unwrap() {
            ParityError::MalformedContainer { reason, .. } => assert!(reason.contains("netcdf")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_memory_store_behaves_like_container() {
        let mut store = MemoryStore::new("mem")
            .with_attribute("version", 9.0)
            .with_scalar("aspect", 3.3)
            .with_vector("iotaf", vec![1.0, 0.9])
            .with_matrix("rmnc", Array2::zeros((2, 4)));
        assert_eq!(store.read_scalar("aspect").unwrap(), 3.3);
        assert_eq!(store.read_array("rmnc").unwrap().shape(), vec![2usize, 4]);
        assert!(store.read_raw("zmnc").unwrap_err().is_field_not_found());
        store.close();
        assert!(store.is_closed());
        assert!(matches!(
            store.variables(),
            Err(ParityError::ContainerClosed)
        ));
    }
}
