// ─────────────────────────────────────────────────────────────────────
// VMEC Parity — Matrix Serde
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Row-major nested-list encoding for `Array2<f64>`.
//!
//! ndarray's own serde form (`{"v":1,"dim":..,"data":..}`) is not readable
//! next to the wout layout, so coefficient tables are written as a list of
//! flux-surface rows instead. Use with `#[serde(with = "...")]`.

use ndarray::Array2;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn to_rows(array: &Array2<f64>) -> Vec<Vec<f64>> {
    array.outer_iter().map(|row| row.to_vec()).collect()
}

fn from_rows(rows: Vec<Vec<f64>>) -> Result<Array2<f64>, String> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(n_rows * n_cols);
    for (idx, row) in rows.into_iter().enumerate() {
        if row.len() != n_cols {
            return Err(format!(
                "ragged matrix: row {idx} has {} columns, expected {n_cols}",
                row.len()
            ));
        }
        flat.extend(row);
    }
    Array2::from_shape_vec((n_rows, n_cols), flat).map_err(|e| e.to_string())
}

pub fn serialize<S: Serializer>(array: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    to_rows(array).serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Array2<f64>, D::Error> {
    let rows = Vec::<Vec<f64>>::deserialize(deserializer)?;
    from_rows(rows).map_err(D::Error::custom)
}

/// Same encoding for optional tables; `None` is written as `null`.
pub mod optional {
    use super::{from_rows, to_rows};
    use ndarray::Array2;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        array: &Option<Array2<f64>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        array.as_ref().map(to_rows).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Array2<f64>>, D::Error> {
        match Option::<Vec<Vec<f64>>>::deserialize(deserializer)? {
            Some(rows) => from_rows(rows).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}
