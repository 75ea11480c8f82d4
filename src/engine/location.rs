//! Source positions attached to every parsed directive.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// A 1-based `file:row:col` position.
///
/// The file path is shared between all locations of one source file, so
/// cloning a `Location` never copies the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    file: Arc<Path>,
    pub row: usize,
    pub col: usize,
}

impl Location {
    pub fn new(file: impl Into<Arc<Path>>, row: usize, col: usize) -> Self {
        Self {
            file: file.into(),
            row,
            col,
        }
    }

    /// Location of the first character of `file`.
    pub fn start_of(file: &Path) -> Self {
        Self::new(Arc::<Path>::from(file), 1, 1)
    }

    /// Same file, different position.
    pub fn at(&self, row: usize, col: usize) -> Self {
        Self {
            file: Arc::clone(&self.file),
            row,
            col,
        }
    }

    /// Directory containing the origin file (used for relative resolution).
    pub fn dir(&self) -> PathBuf {
        self.file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.row, self.col)
    }
}
