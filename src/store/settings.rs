//! User-tunable fetch settings.
//!
//! Written by the external settings surface; the orchestrator only reads it.

use super::document::JsonDocument;
use serde::{Deserialize, Serialize};

/// Persisted settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsRecord {
    /// Ask the server for the extended (graph) payload.
    pub extended_graph_requested: bool,
    /// Keys this service does not interpret, kept so saves do not drop them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Settings document store.
pub type SettingsStore = JsonDocument<SettingsRecord>;
