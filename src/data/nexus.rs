//! NeXus reader.
//!
//! A NeXus file is loaded into a small in-memory tree ([`NxGroup`] /
//! [`NxField`]) and every `NXdata` group of every `NXentry` becomes one
//! dataset with columns `[axes..., signal, errors]`. Axes are stored as bin
//! edges and are converted to bin centres.
//!
//! Loading the tree from disk needs libhdf5 and is only available with the
//! `hdf5` feature; extracting datasets from a tree does not.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::debug;
use ndarray::{s, stack, Array1, Array2, Axis};

use super::error::{FormatError, WithPath};
use super::loader::DataReader;
use super::model::Dataset;

// ---------------------------------------------------------------------------
// In-memory tree
// ---------------------------------------------------------------------------

/// A numeric field (HDF5 dataset) flattened to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct NxField {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
    pub attrs: BTreeMap<String, String>,
}

impl NxField {
    /// A one-dimensional field.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            shape: vec![values.len()],
            values,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Dimensions longer than one.
    fn rank(&self) -> usize {
        self.shape.iter().filter(|&&d| d > 1).count()
    }
}

/// A group with its attributes, fields and child groups in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NxGroup {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub fields: Vec<NxField>,
    pub groups: Vec<NxGroup>,
}

impl NxGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A group tagged with an `NX_class` attribute.
    pub fn with_class(name: impl Into<String>, class: &str) -> Self {
        Self::new(name).with_attr("NX_class", class)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, field: NxField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_group(mut self, group: NxGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn nx_class(&self) -> Option<&str> {
        self.attrs.get("NX_class").map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&NxField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Child groups of the given `NX_class`, in order.
    pub fn groups_of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a NxGroup> {
        self.groups.iter().filter(move |g| g.nx_class() == Some(class))
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reader for NeXus (`.nxs`) files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NexusReader;

impl DataReader for NexusReader {
    fn read(&self, path: &Path) -> Result<Vec<Dataset>, FormatError> {
        read_nexus(path).with_path(path)
    }

    fn format_name(&self) -> &'static str {
        "NeXus"
    }
}

fn read_nexus(path: &Path) -> Result<Vec<Dataset>> {
    let root = load_tree(path)?;
    let datasets = datasets_from_tree(&root)?;
    debug!("{}: {} NXdata group(s)", path.display(), datasets.len());
    Ok(datasets)
}

#[cfg(feature = "hdf5")]
use self::hdf5_backend::load_tree;

#[cfg(not(feature = "hdf5"))]
fn load_tree(_path: &Path) -> Result<NxGroup> {
    bail!("NeXus support is not built in; enable the `hdf5` feature")
}

/// One dataset per `NXdata` group, over all `NXentry` groups, in order.
pub fn datasets_from_tree(root: &NxGroup) -> Result<Vec<Dataset>> {
    let mut datasets = Vec::new();
    for entry in root.groups_of_class("NXentry") {
        for group in entry.groups_of_class("NXdata") {
            let data = data_group_table(group)
                .with_context(|| format!("NXdata group /{}/{}", entry.name, group.name))?;
            datasets.push(Dataset::new(group.name.clone(), data));
        }
    }
    if datasets.is_empty() {
        bail!("no NXdata groups found under any NXentry");
    }
    Ok(datasets)
}

/// Build the `[axes..., signal, errors]` table of one `NXdata` group.
fn data_group_table(group: &NxGroup) -> Result<Array2<f64>> {
    let signal = signal_field(group)?;
    if signal.rank() > 1 {
        bail!(
            "signal '{}' has shape {:?}, only one-dimensional data is supported",
            signal.name,
            signal.shape
        );
    }
    let n = signal.values.len();
    if n == 0 {
        bail!("signal '{}' is empty", signal.name);
    }

    let errors = group
        .field(&format!("{}_errors", signal.name))
        .or_else(|| group.field("errors"))
        .with_context(|| format!("no error array for signal '{}'", signal.name))?;
    if errors.values.len() != n {
        bail!(
            "error array '{}' has {} values but signal '{}' has {n}",
            errors.name,
            errors.values.len(),
            signal.name
        );
    }

    let mut columns: Vec<Array1<f64>> = Vec::new();
    for axis in axis_fields(group, &signal.name)? {
        if axis.values.len() != n + 1 {
            bail!(
                "axis '{}' has {} values, expected {} bin edges for {n} signal points",
                axis.name,
                axis.values.len(),
                n + 1
            );
        }
        columns.push(bin_centres(&Array1::from(axis.values.clone())));
    }
    columns.push(Array1::from(signal.values.clone()));
    columns.push(Array1::from(errors.values.clone()));

    let views: Vec<_> = columns.iter().map(|c| c.view()).collect();
    Ok(stack(Axis(1), &views)?)
}

/// Midpoints of adjacent bin edges.
pub fn bin_centres(edges: &Array1<f64>) -> Array1<f64> {
    if edges.len() < 2 {
        return Array1::zeros(0);
    }
    (&edges.slice(s![..-1]) + &edges.slice(s![1..])) / 2.0
}

/// The signal field: named by the group's `signal` attribute, or else the
/// field carrying a `signal` attribute (older NeXus files).
fn signal_field(group: &NxGroup) -> Result<&NxField> {
    if let Some(name) = group.attrs.get("signal") {
        return group
            .field(name)
            .with_context(|| format!("signal attribute names missing field '{name}'"));
    }
    group
        .fields
        .iter()
        .find(|f| f.attrs.contains_key("signal"))
        .context("no signal array")
}

/// Plot axes: named by the group's `axes` attribute, or else fields carrying
/// an `axis`/`primary` attribute.
fn axis_fields<'a>(group: &'a NxGroup, signal: &str) -> Result<Vec<&'a NxField>> {
    let axes: Vec<&NxField> = match group.attrs.get("axes") {
        Some(list) => split_axes(list)
            .into_iter()
            .map(|name| {
                group
                    .field(name)
                    .with_context(|| format!("axes attribute names missing field '{name}'"))
            })
            .collect::<Result<_>>()?,
        None => {
            // Legacy: `axes` attribute on the signal itself, then tagged fields.
            let from_signal = group
                .field(signal)
                .and_then(|f| f.attrs.get("axes"))
                .map(|list| split_axes(list));
            match from_signal {
                Some(names) => names.into_iter().filter_map(|n| group.field(n)).collect(),
                None => group
                    .fields
                    .iter()
                    .filter(|f| f.attrs.contains_key("axis") || f.attrs.contains_key("primary"))
                    .collect(),
            }
        }
    };
    if axes.is_empty() {
        bail!("no plot axes");
    }
    Ok(axes)
}

/// Split an `axes` attribute (`"Qz"`, `"x:y"`, `"x,y"`, `"[x y]"`), dropping
/// `.` placeholders.
fn split_axes(list: &str) -> Vec<&str> {
    list.split(|c: char| c == ':' || c == ',' || c.is_whitespace())
        .map(|s| s.trim_matches(|c| matches!(c, '[' | ']' | '\'' | '"')))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

// ---------------------------------------------------------------------------
// HDF5 backend
// ---------------------------------------------------------------------------

#[cfg(feature = "hdf5")]
mod hdf5_backend {
    use std::collections::BTreeMap;
    use std::path::Path;

    use anyhow::{Context, Result};
    use hdf5::types::{FixedAscii, FixedUnicode, VarLenAscii, VarLenUnicode};
    use hdf5::{Attribute, File as Hdf5File, Group, Location};
    use log::trace;

    use super::{NxField, NxGroup};

    /// Load the whole group tree of a NeXus file. Non-numeric fields are
    /// skipped.
    pub(super) fn load_tree(path: &Path) -> Result<NxGroup> {
        let file = Hdf5File::open(path).context("opening HDF5 container")?;
        load_group(&file, "")
    }

    fn load_group(group: &Group, name: &str) -> Result<NxGroup> {
        let mut node = NxGroup::new(name);
        node.attrs = read_attrs(group);

        let members = group
            .member_names()
            .with_context(|| format!("listing members of '{}'", group.name()))?;
        for member in members {
            if let Ok(ds) = group.dataset(&member) {
                match ds.read_raw::<f64>() {
                    Ok(values) => node.fields.push(NxField {
                        name: member,
                        shape: ds.shape(),
                        values,
                        attrs: read_attrs(&ds),
                    }),
                    Err(e) => trace!("skipping non-numeric field {}: {e}", ds.name()),
                }
            } else if let Ok(sub) = group.group(&member) {
                node.groups.push(load_group(&sub, &member)?);
            }
        }
        Ok(node)
    }

    fn read_attrs(loc: &Location) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        for name in loc.attr_names().unwrap_or_default() {
            if let Some(value) = loc.attr(&name).ok().as_ref().and_then(attr_to_string) {
                attrs.insert(name, value);
            }
        }
        attrs
    }

    /// Render a string or integer attribute (scalar or 1-D array) as text.
    /// Arrays are joined with commas.
    fn attr_to_string(attr: &Attribute) -> Option<String> {
        if let Ok(s) = attr.read_scalar::<VarLenUnicode>() {
            return Some(s.as_str().to_owned());
        }
        if let Ok(s) = attr.read_scalar::<VarLenAscii>() {
            return Some(s.as_str().to_owned());
        }
        if let Ok(s) = attr.read_scalar::<FixedAscii<256>>() {
            return Some(s.as_str().to_owned());
        }
        if let Ok(s) = attr.read_scalar::<FixedUnicode<256>>() {
            return Some(s.as_str().to_owned());
        }
        if let Ok(v) = attr.read_scalar::<i64>() {
            return Some(v.to_string());
        }
        if let Ok(v) = attr.read_raw::<VarLenUnicode>() {
            return Some(join(v.iter().map(|s| s.as_str())));
        }
        if let Ok(v) = attr.read_raw::<FixedAscii<256>>() {
            return Some(join(v.iter().map(|s| s.as_str())));
        }
        None
    }

    fn join<'a>(parts: impl Iterator<Item = &'a str>) -> String {
        parts.collect::<Vec<_>>().join(",")
    }
}
