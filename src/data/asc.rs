use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use ndarray::Array2;

use super::error::{FormatError, WithPath};
use super::loader::{file_stem, DataReader};
use super::model::{matrix_from_rows, parse_cell, Dataset};

// ---------------------------------------------------------------------------
// ISIS histogram ASCII (.asc)
// ---------------------------------------------------------------------------

/// Reader for ISIS histogram `.asc` files: comma-separated rows of
/// `bin edge, count, ...` with no header.
#[derive(Debug, Clone, Copy, Default)]
pub struct AscReader;

impl DataReader for AscReader {
    fn read(&self, path: &Path) -> Result<Vec<Dataset>, FormatError> {
        read_asc(path).with_path(path)
    }

    fn format_name(&self) -> &'static str {
        "ISIS histogram ASCII"
    }
}

fn read_asc(path: &Path) -> Result<Vec<Dataset>> {
    let file = File::open(path).context("opening .asc file")?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.context("reading .asc row")?;
        let row = record
            .iter()
            .enumerate()
            .map(|(col, tok)| parse_cell(tok, i + 1, col + 1))
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    let mut data = matrix_from_rows(rows)?;
    centre_populated_bins(&mut data);
    debug!("{}: {} histogram rows", path.display(), data.nrows());

    Ok(vec![Dataset::new(file_stem(path), data)])
}

/// Convert left bin edges to bin centres, but only for populated bins.
///
/// For every row except the last, if its count (column 1) is non-zero, the
/// edge in column 0 is moved halfway towards the next row's edge. Rows with a
/// zero count keep their raw edge, and the last row is never touched. The
/// output can therefore mix edges and centres; this matches the historical
/// RasCAL `hist2xy` conversion and is kept as is.
pub fn centre_populated_bins(data: &mut Array2<f64>) {
    for i in 0..data.nrows().saturating_sub(1) {
        if data[[i, 1]] != 0.0 {
            let next = data[[i + 1, 0]];
            data[[i, 0]] += (next - data[[i, 0]]) / 2.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;

    #[test]
    fn test_centre_populated_bins() {
        let mut data = array![[0.0, 1.0], [2.0, 1.0], [4.0, 0.0], [6.0, 1.0]];
        centre_populated_bins(&mut data);
        assert_eq!(data, array![[1.0, 1.0], [3.0, 1.0], [4.0, 0.0], [6.0, 1.0]]);
    }

    #[test]
    fn test_centre_uses_original_next_edge() {
        // Each midpoint is taken against the next row's edge before that row
        // is itself shifted.
        let mut data = array![[0.0, 5.0, 0.1], [1.0, 5.0, 0.1], [3.0, 5.0, 0.1]];
        centre_populated_bins(&mut data);
        assert_eq!(data.column(0).to_vec(), vec![0.5, 2.0, 3.0]);
        assert_eq!(data.column(2).to_vec(), vec![0.1, 0.1, 0.1]);
    }

    #[test]
    fn test_centre_single_row_untouched() {
        let mut data = array![[1.0, 3.0]];
        centre_populated_bins(&mut data);
        assert_eq!(data, array![[1.0, 3.0]]);
    }

    #[test]
    fn test_read_asc_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f88904_06.asc");
        let mut f = File::create(&path).unwrap();
        write!(f, "0.0,1.0,0.1\n2.0,1.0,0.1\n4.0,0.0,0.0\n6.0,1.0,0.1\n").unwrap();
        drop(f);

        let data = AscReader.read(&path).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name, "f88904_06");
        assert_eq!(data[0].data.dim(), (4, 3));
        assert_eq!(data[0].data.column(0).to_vec(), vec![1.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_read_asc_rejects_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let ragged = dir.path().join("ragged.asc");
        std::fs::write(&ragged, "0,1,2\n1,2\n").unwrap();
        assert!(AscReader.read(&ragged).is_err());

        let text = dir.path().join("text.asc");
        std::fs::write(&text, "0,1\nq,2\n").unwrap();
        assert!(AscReader.read(&text).is_err());

        let spaced = dir.path().join("spaced.asc");
        std::fs::write(&spaced, "0 1\n1 2\n").unwrap();
        assert!(AscReader.read(&spaced).is_err());
    }
}
