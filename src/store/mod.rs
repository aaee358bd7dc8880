//! Persisted documents: fetch status, user settings, and the raw payload.

pub mod blob;
pub mod document;
pub mod settings;
pub mod status;

pub use blob::{BlobWriter, FileBlobStore};
pub use document::JsonDocument;
pub use settings::{SettingsRecord, SettingsStore};
pub use status::{ERROR_NO_TRANSPORT, ERROR_UPDATE_FAILED, StatusRecord, StatusStore};
