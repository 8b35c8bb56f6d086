//! Libraries and images

use std::path::{Path, PathBuf};

use crate::id::LibraryId;

/// A source document that data has been linked from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Library {
    pub(crate) path: PathBuf,
}

impl Library {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the library, as shown in outliners
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// An externally referenced resource file, optionally packed
#[derive(Clone, Debug)]
pub struct Image {
    pub(crate) name: String,
    pub(crate) library: Option<LibraryId>,
    pub filepath: PathBuf,
    pub packed: Option<Vec<u8>>,
}

impl Image {
    pub fn new(name: impl Into<String>, filepath: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            library: None,
            filepath: filepath.into(),
            packed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn library(&self) -> Option<LibraryId> {
        self.library
    }

    pub fn is_packed(&self) -> bool {
        self.packed.is_some()
    }
}
