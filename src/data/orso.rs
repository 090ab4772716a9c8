use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::debug;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use super::error::{FormatError, WithPath};
use super::loader::DataReader;
use super::model::{matrix_from_rows, parse_cell, Dataset};

// ---------------------------------------------------------------------------
// ORSO reflectivity text format (.ort)
// ---------------------------------------------------------------------------

/// Reader for ORSO `.ort` files.
///
/// One dataset per data block, named after the block's sample. Repeated
/// sample names within a file are made unique with a `-n` suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrsoReader;

impl DataReader for OrsoReader {
    fn read(&self, path: &Path) -> Result<Vec<Dataset>, FormatError> {
        read_orso(path).with_path(path)
    }

    fn format_name(&self) -> &'static str {
        "ORSO reflectivity"
    }
}

const MAGIC: &str = "# # ORSO";

#[derive(Debug, Deserialize)]
struct Header {
    data_source: DataSource,
    #[serde(default)]
    columns: Option<Vec<YamlValue>>,
}

#[derive(Debug, Deserialize)]
struct DataSource {
    sample: Sample,
}

#[derive(Debug, Deserialize)]
struct Sample {
    name: YamlValue,
}

/// Raw text of one data block: its YAML header and numeric rows.
#[derive(Debug, Default)]
struct Block {
    header: String,
    rows: Vec<(usize, String)>,
}

fn read_orso(path: &Path) -> Result<Vec<Dataset>> {
    let text = std::fs::read_to_string(path).context("reading ORSO file")?;
    let mut datasets = parse_orso(&text)?;
    disambiguate_names(&mut datasets);
    debug!("{}: {} ORSO dataset(s)", path.display(), datasets.len());
    Ok(datasets)
}

/// Parse every data block of an ORSO text file.
fn parse_orso(text: &str) -> Result<Vec<Dataset>> {
    if !text.starts_with(MAGIC) {
        bail!("first line does not start with '{MAGIC}', not an ORSO file");
    }

    let blocks = split_blocks(text);
    let mut first: Option<YamlValue> = None;
    let mut datasets = Vec::with_capacity(blocks.len());

    for (n, block) in blocks.into_iter().enumerate() {
        let parsed: YamlValue = serde_yaml::from_str(&block.header)
            .with_context(|| format!("parsing header of data block {}", n + 1))?;

        // Later blocks only carry what changed relative to the first one.
        let merged = match &first {
            None => {
                first = Some(parsed.clone());
                parsed
            }
            Some(base) => {
                let mut merged = base.clone();
                merge_yaml(&mut merged, parsed);
                merged
            }
        };

        let dataset = block_to_dataset(merged, block.rows)
            .with_context(|| format!("data block {}", n + 1))?;
        datasets.push(dataset);
    }
    Ok(datasets)
}

/// Split the file into header/data blocks. After data, a `# data_set` line
/// begins the next block; any other comment there is ignored.
fn split_blocks(text: &str) -> Vec<Block> {
    let mut blocks = vec![Block::default()];
    for (i, line) in text.lines().enumerate() {
        if let Some(comment) = line.strip_prefix('#') {
            let after_data = blocks.last().is_some_and(|b| !b.rows.is_empty());
            if after_data {
                if !comment.trim_start().starts_with("data_set") {
                    continue;
                }
                blocks.push(Block::default());
            }
            if let Some(block) = blocks.last_mut() {
                block.header.push_str(comment.strip_prefix(' ').unwrap_or(comment));
                block.header.push('\n');
            }
        } else if !line.trim().is_empty() {
            if let Some(block) = blocks.last_mut() {
                block.rows.push((i + 1, line.to_string()));
            }
        }
    }
    blocks
}

fn block_to_dataset(header: YamlValue, rows: Vec<(usize, String)>) -> Result<Dataset> {
    let header: Header =
        serde_yaml::from_value(header).context("header has no data_source.sample.name")?;
    let name = match header.data_source.sample.name {
        YamlValue::String(s) => s,
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        other => bail!("sample name must be a scalar, got {other:?}"),
    };
    if name.is_empty() {
        bail!("sample name is empty");
    }

    let rows = rows
        .iter()
        .map(|(line, text)| {
            text.split_whitespace()
                .enumerate()
                .map(|(col, tok)| parse_cell(tok, *line, col + 1))
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    let data = matrix_from_rows(rows)?;

    if let Some(columns) = &header.columns {
        if columns.len() != data.ncols() {
            bail!(
                "header declares {} column(s) but the data has {}",
                columns.len(),
                data.ncols()
            );
        }
    }

    Ok(Dataset::new(name, data))
}

/// Recursively overlay `update` onto `base`. Mappings merge key by key;
/// any other value replaces what was there.
fn merge_yaml(base: &mut YamlValue, update: YamlValue) {
    match (base, update) {
        (_, YamlValue::Null) => {}
        (YamlValue::Mapping(base), YamlValue::Mapping(update)) => {
            for (key, value) in update {
                match base.get_mut(&key) {
                    Some(slot) => merge_yaml(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Make dataset names unique within one file.
///
/// The first occurrence of a name is kept; each later repeat of that name
/// gets `-1`, `-2`, ... in order. Only names repeated from earlier in the
/// list are touched.
pub fn disambiguate_names(datasets: &mut [Dataset]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for ds in datasets.iter_mut() {
        match seen.get_mut(&ds.name) {
            Some(count) => {
                *count += 1;
                ds.name = format!("{}-{count}", ds.name);
            }
            None => {
                seen.insert(ds.name.clone(), 0);
            }
        }
    }
}
