//! Readers for neutron and X-ray reflectometry data files.
//!
//! [`read_file`] picks a reader from the file extension and returns every
//! dataset in the file as a named `[x, y, error, ...]` table:
//!
//! ```no_run
//! let datasets = rascal_readers::read_file("f88904_06.asc")?;
//! for ds in &datasets {
//!     println!("{}: {} points", ds.name, ds.len());
//! }
//! # Ok::<(), rascal_readers::FormatError>(())
//! ```
//!
//! # Features
//!
//! NeXus (`.nxs`) files are HDF5 containers and need the `hdf5` feature,
//! which links against libhdf5. Without it, `.nxs` files still resolve to
//! [`NexusReader`], but reading one fails with a [`FormatError`] that names
//! the missing feature. `hdf5-static` builds and links HDF5 from source.

pub mod data;

pub use data::asc::AscReader;
pub use data::error::FormatError;
pub use data::loader::{read_file, resolve, resolve_path, DataReader, ReaderKind};
pub use data::model::Dataset;
pub use data::nexus::NexusReader;
pub use data::orso::OrsoReader;
pub use data::text::TextReader;
