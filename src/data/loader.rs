use std::fmt;
use std::path::Path;

use log::{debug, trace};

use super::asc::AscReader;
use super::error::FormatError;
use super::model::Dataset;
use super::nexus::NexusReader;
use super::orso::OrsoReader;
use super::text::TextReader;

// ---------------------------------------------------------------------------
// Reader trait
// ---------------------------------------------------------------------------

/// Turns one file into an ordered list of datasets.
///
/// Implementations hold no state between calls. A failure discards every
/// dataset parsed from the file so far.
pub trait DataReader: Send + Sync {
    /// Read every dataset in the file at `path`, in the order found.
    fn read(&self, path: &Path) -> Result<Vec<Dataset>, FormatError>;

    /// Short human-readable format name.
    fn format_name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The reader variants known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderKind {
    /// Delimited text with sniffed delimiter and header (the fallback).
    Text,
    /// ISIS histogram ASCII.
    Asc,
    /// NeXus hierarchical container.
    Nexus,
    /// ORSO reflectivity text format.
    Orso,
}

/// Lower-cased extension (with leading dot) → reader. Anything else is text.
const READERS: &[(&str, ReaderKind)] = &[
    (".asc", ReaderKind::Asc),
    (".nxs", ReaderKind::Nexus),
    (".ort", ReaderKind::Orso),
];

const DEFAULT_READER: ReaderKind = ReaderKind::Text;

static TEXT: TextReader = TextReader;
static ASC: AscReader = AscReader;
static NEXUS: NexusReader = NexusReader;
static ORSO: OrsoReader = OrsoReader;

impl ReaderKind {
    /// The reader implementing this variant.
    pub fn reader(self) -> &'static dyn DataReader {
        match self {
            ReaderKind::Text => &TEXT,
            ReaderKind::Asc => &ASC,
            ReaderKind::Nexus => &NEXUS,
            ReaderKind::Orso => &ORSO,
        }
    }
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reader().format_name())
    }
}

/// Pick the reader for an extension such as `".asc"`.
///
/// Case-insensitive. Never fails: unknown or empty extensions resolve to
/// [`ReaderKind::Text`].
pub fn resolve(extension: &str) -> ReaderKind {
    let ext = extension.to_ascii_lowercase();
    READERS
        .iter()
        .find(|(key, _)| *key == ext)
        .map_or(DEFAULT_READER, |(_, kind)| *kind)
}

/// Pick the reader for a path from its extension alone.
pub fn resolve_path(path: &Path) -> ReaderKind {
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    resolve(&ext)
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Read all datasets from a file, choosing the reader by extension.
///
/// Supported formats:
/// * `.asc` – ISIS histogram, comma-separated bin edges and counts
/// * `.nxs` – NeXus file, one dataset per `NXdata` group (needs `hdf5`)
/// * `.ort` – ORSO reflectivity file, one dataset per data block
/// * anything else – delimited text with a sniffed delimiter and header
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<Dataset>, FormatError> {
    let path = path.as_ref();
    let kind = resolve_path(path);
    debug!("reading {} as {kind}", path.display());

    let datasets = kind.reader().read(path)?;
    for ds in &datasets {
        trace!("  {}: {} x {}", ds.name, ds.len(), ds.ncols());
    }
    Ok(datasets)
}

/// Dataset name for single-dataset formats: the file name without directory
/// or extension.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
