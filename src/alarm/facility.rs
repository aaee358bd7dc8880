//! Host alarm facility and a file-backed implementation.
//!
//! The facility only knows one-shot wake-ups: a target, an opaque payload,
//! and a due time. Repeating behaviour is the caller's job.

use crate::clock::Clock;
use crate::store::document::{load_record, save_record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Opaque identifier of one pending wake-up. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmHandle(pub u64);

impl fmt::Display for AlarmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alarm#{}", self.0)
    }
}

/// A one-shot wake-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmRequest {
    /// Service the host should wake.
    pub target: String,
    /// Payload delivered verbatim on wake-up.
    pub payload: String,
    /// Delay from now, in seconds.
    pub delay_secs: u64,
}

/// The host's alarm API.
pub trait AlarmFacility: Send + Sync {
    /// Schedule a wake-up. `None` means the host refused it.
    fn set(&self, request: AlarmRequest) -> Option<AlarmHandle>;

    /// All pending wake-ups, earliest first.
    fn pending(&self) -> Vec<AlarmHandle>;

    /// Cancel a wake-up. Unknown handles are ignored.
    fn cancel(&self, handle: AlarmHandle);
}

/// A wake-up recorded in the alarm table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAlarm {
    pub id: AlarmHandle,
    pub due_at_ms: u64,
    pub target: String,
    pub payload: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AlarmTable {
    next_id: u64,
    alarms: Vec<PendingAlarm>,
}

impl AlarmTable {
    fn allocate_id(&mut self) -> AlarmHandle {
        let id = self.next_id.max(1);
        self.next_id = id.saturating_add(1);
        AlarmHandle(id)
    }
}

/// Alarm table persisted as JSON, so wake-ups survive host restarts.
///
/// The host loop polls [`next_due`](Self::next_due) and drains fired alarms
/// with [`take_due`](Self::take_due).
pub struct FileAlarmFacility {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl FileAlarmFacility {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Due time of the earliest pending alarm.
    #[must_use]
    pub fn next_due(&self) -> Option<u64> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_table()
            .alarms
            .iter()
            .map(|a| a.due_at_ms)
            .min()
    }

    /// Remove and return every alarm due at or before `now_ms`, earliest first.
    pub fn take_due(&self, now_ms: u64) -> Vec<PendingAlarm> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut table = self.read_table();
        let (mut due, rest): (Vec<_>, Vec<_>) = table
            .alarms
            .into_iter()
            .partition(|a| a.due_at_ms <= now_ms);
        if due.is_empty() {
            return due;
        }
        table.alarms = rest;
        if let Err(e) = save_record(&self.path, &table) {
            tracing::error!(error = %e, "cannot persist alarm table after firing");
        }
        due.sort_by_key(|a| (a.due_at_ms, a.id));
        due
    }

    /// Snapshot of every pending alarm.
    #[must_use]
    pub fn list(&self) -> Vec<PendingAlarm> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut alarms = self.read_table().alarms;
        alarms.sort_by_key(|a| (a.due_at_ms, a.id));
        alarms
    }

    fn read_table(&self) -> AlarmTable {
        load_record(&self.path)
    }
}

impl AlarmFacility for FileAlarmFacility {
    fn set(&self, request: AlarmRequest) -> Option<AlarmHandle> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut table = self.read_table();
        let id = table.allocate_id();
        let due_at_ms = self
            .clock
            .now_ms()
            .saturating_add(request.delay_secs.saturating_mul(1000));
        table.alarms.push(PendingAlarm {
            id,
            due_at_ms,
            target: request.target,
            payload: request.payload,
        });

        match save_record(&self.path, &table) {
            Ok(()) => Some(id),
            Err(e) => {
                tracing::error!(error = %e, "cannot persist alarm table");
                None
            }
        }
    }

    fn pending(&self) -> Vec<AlarmHandle> {
        self.list().into_iter().map(|a| a.id).collect()
    }

    fn cancel(&self, handle: AlarmHandle) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut table = self.read_table();
        let before = table.alarms.len();
        table.alarms.retain(|a| a.id != handle);
        if table.alarms.len() == before {
            return;
        }
        if let Err(e) = save_record(&self.path, &table) {
            tracing::error!(error = %e, %handle, "cannot persist alarm cancellation");
        }
    }
}
