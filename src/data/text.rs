use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use super::error::{FormatError, WithPath};
use super::loader::{file_stem, DataReader};
use super::model::{matrix_from_rows, parse_cell, Dataset};
use super::sniff::{sniff_delimiter, sniff_header, strip_comment, Delimiter, SNIFF_LEN};

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

/// Reader for plain delimited text (CSV, TSV, whitespace columns, ...).
///
/// The delimiter and the presence of a header row are sniffed from the first
/// [`SNIFF_LEN`] bytes. Everything after a `#` is a comment, and lines left
/// blank by that are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReader;

impl DataReader for TextReader {
    fn read(&self, path: &Path) -> Result<Vec<Dataset>, FormatError> {
        read_text(path).with_path(path)
    }

    fn format_name(&self) -> &'static str {
        "delimited text"
    }
}

fn read_text(path: &Path) -> Result<Vec<Dataset>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)
        .context("opening text file")?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .context("reading sniff sample")?;
    let truncated = head.len() == SNIFF_LEN;
    let sample = String::from_utf8_lossy(&head);

    let delimiter = sniff_delimiter(&sample, truncated)?;
    let has_header = sniff_header(&sample, truncated, delimiter);
    debug!(
        "{}: delimiter {delimiter}, header {has_header}",
        path.display()
    );

    let file = File::open(path).context("reopening text file")?;
    let lines = data_lines(BufReader::new(file))?;
    let rows = match delimiter {
        Delimiter::Byte(b) => parse_delimited(&lines, b, has_header)?,
        Delimiter::Whitespace => parse_whitespace(&lines, has_header)?,
    };
    let data = matrix_from_rows(rows)?;

    Ok(vec![Dataset::new(file_stem(path), data)])
}

/// Non-empty lines with comments removed, paired with 1-based line numbers.
fn data_lines<R: BufRead>(input: R) -> Result<Vec<(usize, String)>> {
    let mut lines = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line.context("reading text line")?;
        let data = strip_comment(&line);
        if !data.is_empty() {
            lines.push((i + 1, data.to_owned()));
        }
    }
    Ok(lines)
}

/// Parse single-byte delimited rows with the `csv` crate.
fn parse_delimited(
    lines: &[(usize, String)],
    delimiter: u8,
    has_header: bool,
) -> Result<Vec<Vec<f64>>> {
    let text = lines
        .iter()
        .map(|(_, l)| l.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_header)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.context("reading delimited row")?;
        // Map the record back to its line in the file.
        let line = record
            .position()
            .and_then(|p| (p.line() as usize).checked_sub(1))
            .and_then(|i| lines.get(i))
            .map_or(0, |(n, _)| *n);
        let row = record
            .iter()
            .enumerate()
            .map(|(col, tok)| parse_cell(tok, line, col + 1))
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Parse rows separated by runs of whitespace.
fn parse_whitespace(lines: &[(usize, String)], has_header: bool) -> Result<Vec<Vec<f64>>> {
    lines
        .iter()
        .skip(usize::from(has_header))
        .map(|(n, line)| {
            line.split_whitespace()
                .enumerate()
                .map(|(col, tok)| parse_cell(tok, *n, col + 1))
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "two.csv", "a,b\n1,2\n3,4");
        let data = TextReader.read(&path).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name, "two");
        assert_eq!(data[0].data, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_read_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "two.csv", "1,2\n3,4");
        let data = TextReader.read(&path).unwrap();
        assert_eq!(data[0].data, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_read_whitespace_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "moto.dat",
            "# Qz R dR\n0.01   1.0   0.05\n0.02   0.5   0.02\n\n0.03   0.1   0.01\n",
        );
        let data = TextReader.read(&path).unwrap();
        assert_eq!(data[0].name, "moto");
        assert_eq!(
            data[0].data,
            array![[0.01, 1.0, 0.05], [0.02, 0.5, 0.02], [0.03, 0.1, 0.01]]
        );
    }

    #[test]
    fn test_read_long_file_past_sniff_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = String::from("q\tR\tdR\n");
        for i in 0..200 {
            let q = i as f64 / 1000.0;
            contents.push_str(&format!("{q}\t{}\t0.01\n", 1.0 / (i + 1) as f64));
        }
        let path = write_file(&dir, "long.txt", &contents);
        let data = TextReader.read(&path).unwrap();
        assert_eq!(data[0].data.dim(), (200, 3));
        assert_eq!(data[0].data[[199, 0]], 0.199);
    }

    #[test]
    fn test_comments_skipped_for_every_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let comma = write_file(&dir, "c.csv", "1,2\n  # note\n3,4 # last\n");
        let spaced = write_file(&dir, "s.dat", "1 2\n  # note\n3 4 # last\n");
        for path in [comma, spaced] {
            let data = TextReader.read(&path).unwrap();
            assert_eq!(data[0].data, array![[1.0, 2.0], [3.0, 4.0]]);
        }
    }

    #[test]
    fn test_error_reports_file_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "lines.csv", "# header comment\n1,2\n\n3,4\n5,x\n");
        let err = TextReader.read(&path).unwrap_err();
        assert!(err.to_string().contains("row 5, column 2"));
    }

    #[test]
    fn test_ragged_rows_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = "1,2,3\n".repeat(10);
        contents.push_str("1,2\n");
        let path = write_file(&dir, "ragged.csv", &contents);
        let err = TextReader.read(&path).unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_non_numeric_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.csv", "1,2\n3,4\n5,x\n");
        let err = TextReader.read(&path).unwrap_err();
        assert!(err.to_string().contains("'x' is not a number"));
    }

    #[test]
    fn test_missing_file_fails() {
        let err = TextReader.read(Path::new("/nonexistent/data.txt")).unwrap_err();
        assert!(err.to_string().contains("opening text file"));
    }
}
