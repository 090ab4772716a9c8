//! Delimiter and header detection for delimited text files.
//!
//! Both heuristics work on a short sample taken from the start of the file,
//! in the spirit of the classic CSV sniffer: the delimiter is the candidate
//! that splits (almost) every line into the same number of fields, and the
//! first line is a header when its cells disagree in type with the columns
//! below it.

use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Result};

/// Bytes read from the start of a file for sniffing.
pub const SNIFF_LEN: usize = 1024;

/// Maximum number of rows below the header consulted when voting.
const HEADER_SNIFF_ROWS: usize = 20;

/// Fraction of sampled lines that must agree on the field count.
const CONSISTENCY: f64 = 0.9;

/// Field separator of a delimited text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// A single byte such as `,`, `\t` or `;`.
    Byte(u8),
    /// Runs of spaces and/or tabs.
    Whitespace,
}

/// Candidates in order of preference.
const CANDIDATES: [Delimiter; 4] = [
    Delimiter::Byte(b','),
    Delimiter::Byte(b'\t'),
    Delimiter::Byte(b';'),
    Delimiter::Whitespace,
];

impl Delimiter {
    /// Split a line into trimmed fields.
    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Byte(b) => line.split(*b as char).map(str::trim).collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Byte(b'\t') => write!(f, "tab"),
            Delimiter::Byte(b) => write!(f, "'{}'", *b as char),
            Delimiter::Whitespace => write!(f, "whitespace"),
        }
    }
}

/// The data part of a line: everything before the first `#`, trimmed.
/// Empty for blank and comment-only lines.
pub(crate) fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(data, _)| data).trim()
}

/// Data lines of a sample. When `truncated` is set the sample was cut off
/// mid-file, so its final line may be partial and is dropped.
fn sample_lines(sample: &str, truncated: bool) -> Vec<&str> {
    let mut lines: Vec<&str> = sample
        .lines()
        .map(strip_comment)
        .filter(|l| !l.is_empty())
        .collect();
    if truncated && lines.len() > 1 && !sample.ends_with('\n') {
        lines.pop();
    }
    lines
}

/// Find the delimiter that splits the sample into a consistent number of
/// fields (at least two).
pub fn sniff_delimiter(sample: &str, truncated: bool) -> Result<Delimiter> {
    let lines = sample_lines(sample, truncated);
    if lines.is_empty() {
        bail!("could not determine delimiter: no data lines in the first {SNIFF_LEN} bytes");
    }

    for candidate in CANDIDATES {
        let mut freq: HashMap<usize, usize> = HashMap::new();
        for line in &lines {
            *freq.entry(candidate.split(line).len()).or_default() += 1;
        }
        // Highest agreement wins; ties go to the wider split.
        let Some((&width, &agree)) = freq.iter().max_by_key(|(w, n)| (**n, **w)) else {
            continue;
        };
        if width >= 2 && agree as f64 >= CONSISTENCY * lines.len() as f64 {
            return Ok(candidate);
        }
    }
    bail!("could not determine delimiter")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Numeric,
    Text(usize),
}

fn cell_kind(cell: &str) -> CellKind {
    if cell.parse::<f64>().is_ok() {
        CellKind::Numeric
    } else {
        CellKind::Text(cell.chars().count())
    }
}

/// Guess whether the first line of the sample is a header row.
///
/// Each column whose type is consistent over the rows below the header casts
/// a vote: for if the header cell differs in kind (a word above numbers, or
/// a string of another length above fixed-length strings), against if it
/// looks like the rest of the column. Columns without a consistent type do
/// not vote.
pub fn sniff_header(sample: &str, truncated: bool, delimiter: Delimiter) -> bool {
    let lines = sample_lines(sample, truncated);
    let Some((header, rest)) = lines.split_first() else {
        return false;
    };
    let header = delimiter.split(header);
    let ncols = header.len();

    // None: not seen yet. Some(None): inconsistent, excluded from voting.
    let mut kinds: Vec<Option<Option<CellKind>>> = vec![None; ncols];
    for row in rest.iter().take(HEADER_SNIFF_ROWS) {
        let cells = delimiter.split(row);
        if cells.len() != ncols {
            continue;
        }
        for (slot, cell) in kinds.iter_mut().zip(cells) {
            let kind = cell_kind(cell);
            match *slot {
                None => *slot = Some(Some(kind)),
                Some(Some(prev)) if prev != kind => *slot = Some(None),
                _ => {}
            }
        }
    }

    let votes: i64 = kinds
        .iter()
        .zip(&header)
        .filter_map(|(kind, cell)| match kind {
            Some(Some(kind)) => Some((*kind, cell_kind(cell))),
            _ => None,
        })
        .map(|(column, head)| if column == head { -1 } else { 1 })
        .sum();
    votes > 0
}
