//! Raw payload storage.

use super::document::write_atomically;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Destination for the last fetched payload, overwritten wholesale.
pub trait BlobWriter: Send + Sync {
    fn write_blob(&self, bytes: &[u8]) -> Result<()>;
}

/// Stores the payload verbatim in a single file.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobWriter for FileBlobStore {
    fn write_blob(&self, bytes: &[u8]) -> Result<()> {
        write_atomically(&self.path, bytes)
    }
}
