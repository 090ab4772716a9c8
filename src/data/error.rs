use std::path::{Path, PathBuf};

use thiserror::Error;

/// A file could not be turned into datasets.
///
/// Carries the offending path and the underlying cause. Readers build the
/// cause with `anyhow` contexts and wrap it once at the `read` boundary.
#[derive(Debug, Error)]
#[error("could not read {}: {source:#}", path.display())]
pub struct FormatError {
    pub path: PathBuf,
    #[source]
    pub source: anyhow::Error,
}

impl FormatError {
    pub fn new(path: &Path, source: impl Into<anyhow::Error>) -> Self {
        Self {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }
}

/// Attach a path to an internal result.
pub(crate) trait WithPath<T> {
    fn with_path(self, path: &Path) -> Result<T, FormatError>;
}

impl<T> WithPath<T> for anyhow::Result<T> {
    fn with_path(self, path: &Path) -> Result<T, FormatError> {
        self.map_err(|e| FormatError::new(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_display_includes_path_and_cause_chain() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("row 3 is ragged"));
        let err = inner
            .context("parsing data block")
            .with_path(Path::new("runs/a.dat"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("could not read runs/a.dat"));
        assert!(msg.contains("parsing data block"));
        assert!(msg.contains("row 3 is ragged"));
    }
}
