//! Durable fetch status.
//!
//! Read by the settings/UI surface to show freshness and the last error, and
//! by the orchestrator to detect a stuck attempt.

use super::document::JsonDocument;
use serde::{Deserialize, Serialize};

/// `lastError` value when the link was down at dispatch time.
pub const ERROR_NO_TRANSPORT: &str = "no_transport";

/// `lastError` value after any unsuccessful fetch.
pub const ERROR_UPDATE_FAILED: &str = "update_failed";

/// Persisted status document. Timestamps are epoch milliseconds, `0` = never.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusRecord {
    /// Start of the most recent attempt, written before any network I/O.
    pub last_update_attempt: u64,
    /// Whether the most recent attempt stored a payload.
    pub last_update_success: bool,
    /// Time of the most recent successful fetch.
    pub last_update: u64,
    /// Empty when healthy.
    pub last_error: String,
}

impl StatusRecord {
    /// Record the start of an attempt at `now_ms`.
    pub fn begin_attempt(&mut self, now_ms: u64) {
        self.last_update_attempt = now_ms;
        self.last_update_success = false;
    }

    /// Record a stored payload at `now_ms`.
    pub fn mark_success(&mut self, now_ms: u64) {
        self.last_update = now_ms;
        self.last_update_success = true;
    }

    /// Derive `last_error` from the success flag.
    pub fn settle_error(&mut self) {
        if self.last_update_success {
            self.last_error.clear();
        } else {
            self.last_error = ERROR_UPDATE_FAILED.to_owned();
        }
    }

    /// Milliseconds since the last attempt started.
    #[must_use]
    pub fn attempt_age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_update_attempt)
    }

    /// Whether the last attempt is older than `threshold_secs`.
    #[must_use]
    pub fn attempt_is_stale(&self, now_ms: u64, threshold_secs: u64) -> bool {
        self.attempt_age_ms(now_ms) > threshold_secs.saturating_mul(1000)
    }
}

/// Status document store.
pub type StatusStore = JsonDocument<StatusRecord>;
