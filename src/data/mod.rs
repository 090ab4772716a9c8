/// Data layer: readers, registry and the dataset record.
///
/// Architecture:
/// ```text
///   path (.dat / .csv / .asc / .nxs / .ort)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  extension → ReaderKind (text by default)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────────────────┐
///   │ text │ asc │ nexus │ orso     │  parse file → Vec<Dataset>
///   └──────────────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  name + Array2<f64> rows of [x, y, error, ...]
///   └──────────┘
/// ```

pub mod asc;
pub mod error;
pub mod loader;
pub mod model;
pub mod nexus;
pub mod orso;
pub mod sniff;
pub mod text;
