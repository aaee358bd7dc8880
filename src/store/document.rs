//! File-backed JSON document with declared defaults.

use crate::error::{FetchError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// A small JSON document persisted at a fixed path.
///
/// The in-memory copy is authoritative between [`reload`](Self::reload) and
/// [`save`](Self::save). Nothing is written implicitly.
#[derive(Debug)]
pub struct JsonDocument<T> {
    path: PathBuf,
    data: T,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Open the document at `path`, loading its current contents.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = load_record(&path);
        Self { path, data }
    }

    /// Replace the in-memory copy with what is on disk.
    pub fn reload(&mut self) {
        self.data = load_record(&self.path);
    }

    /// [`reload`](Self::reload) with the read done on the blocking pool.
    pub async fn reload_async(&mut self)
    where
        T: Send + 'static,
    {
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || load_record(&path)).await {
            Ok(data) => self.data = data,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "document read task failed, keeping cached copy");
            }
        }
    }

    /// Persist the in-memory copy.
    pub fn save(&self) -> Result<()> {
        save_record(&self.path, &self.data)
    }

    /// Persist the in-memory copy, doing the file I/O on the blocking pool.
    ///
    /// The document is encoded before the hand-off, so the caller's view is
    /// what lands on disk.
    pub async fn save_async(&self) -> Result<()> {
        let json = encode(&self.path, &self.data)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &json))
            .await
            .map_err(|e| FetchError::Storage(format!("document write task failed: {e}")))?
    }

    #[must_use]
    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Load a record, falling back to defaults when the file is missing or
/// cannot be parsed.
pub fn load_record<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read document, using defaults");
            return T::default();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                "ignoring malformed document at {}: {e}",
                path.display()
            );
            T::default()
        }
    }
}

/// Serialize and atomically overwrite the document at `path`.
pub fn save_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let json = encode(path, record)?;
    write_atomically(path, &json)
}

fn encode<T: Serialize>(path: &Path, record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(record)
        .map_err(|e| FetchError::Storage(format!("cannot serialize {}: {e}", path.display())))
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
///
/// Readers observe either the previous contents or the new ones, never a
/// truncated file.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            FetchError::Storage(format!(
                "cannot create directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = temp_sibling(path);
    std::fs::write(&tmp_path, bytes).map_err(|e| {
        FetchError::Storage(format!("cannot write {}: {e}", tmp_path.display()))
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        FetchError::Storage(format!("cannot finalize {}: {e}", path.display()))
    })?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
