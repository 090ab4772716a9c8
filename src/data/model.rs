use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1, Axis};

// ---------------------------------------------------------------------------
// Dataset – one named numeric table
// ---------------------------------------------------------------------------

/// A single named dataset produced by a reader.
///
/// Rows are observations; columns are conventionally `[x, y, error, ...]`
/// (for reflectivity: momentum transfer, reflectivity, uncertainty).
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Human-readable identifier (file stem, group name or sample name).
    pub name: String,
    /// Observation table, at least one row and two columns.
    pub data: Array2<f64>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, data: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Number of observations (rows).
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Number of columns per observation.
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// View of column `index`, or `None` if out of range.
    pub fn column(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.data.ncols()).then(|| self.data.index_axis(Axis(1), index))
    }
}

// ---------------------------------------------------------------------------
// Matrix construction
// ---------------------------------------------------------------------------

/// Assemble parsed rows into a rectangular table.
///
/// Every row must have the same width, and the result must have at least one
/// row and two columns.
pub(crate) fn matrix_from_rows(rows: Vec<Vec<f64>>) -> Result<Array2<f64>> {
    let Some(first) = rows.first() else {
        bail!("file contains no data rows");
    };
    let ncols = first.len();
    if ncols < 2 {
        bail!("data rows have {ncols} column(s), at least 2 are required");
    }

    let nrows = rows.len();
    let mut flat = Vec::with_capacity(nrows * ncols);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != ncols {
            bail!(
                "row {} has {} column(s) but the first row has {ncols}",
                i + 1,
                row.len()
            );
        }
        flat.extend(row);
    }

    Ok(Array2::from_shape_vec((nrows, ncols), flat)?)
}

/// Parse a single numeric cell, naming its position on failure.
pub(crate) fn parse_cell(token: &str, row: usize, col: usize) -> Result<f64> {
    let token = token.trim();
    match token.parse::<f64>() {
        Ok(v) => Ok(v),
        Err(_) => bail!("row {row}, column {col}: '{token}' is not a number"),
    }
}
