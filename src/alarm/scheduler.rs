//! Alarm scheduling for the fetch service.

use super::facility::{AlarmFacility, AlarmHandle, AlarmRequest};
use crate::command::Command;
use crate::error::{FetchError, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host target woken by the service's alarms.
pub const FETCH_SERVICE_TARGET: &str = "fetch-service";

/// Wraps the host alarm facility and keeps at most one wake-up pending.
#[derive(Clone)]
pub struct AlarmScheduler {
    facility: Arc<dyn AlarmFacility>,
    target: String,
}

impl AlarmScheduler {
    pub fn new(facility: Arc<dyn AlarmFacility>) -> Self {
        Self {
            facility,
            target: FETCH_SERVICE_TARGET.to_owned(),
        }
    }

    /// The earliest pending wake-up, if any.
    #[must_use]
    pub fn pending(&self) -> Option<AlarmHandle> {
        self.facility.pending().into_iter().next()
    }

    /// Arm a one-shot wake-up carrying `command` after `delay_secs`.
    ///
    /// Any wake-up already pending is cancelled first. A refusal from the
    /// host is logged and returned; it is not retried.
    pub fn schedule(&self, delay_secs: u64, command: Command) -> Result<AlarmHandle> {
        for stale in self.facility.pending() {
            debug!(handle = %stale, "replacing pending alarm");
            self.facility.cancel(stale);
        }

        let request = AlarmRequest {
            target: self.target.clone(),
            payload: command.to_payload(),
            delay_secs,
        };

        match self.facility.set(request) {
            Some(handle) => {
                info!(%handle, delay_secs, "next fetch alarm armed");
                Ok(handle)
            }
            None => {
                warn!(delay_secs, "cannot create next fetch alarm");
                Err(FetchError::Scheduling(format!(
                    "host refused a {delay_secs}s alarm for {}",
                    self.target
                )))
            }
        }
    }

    /// Cancel one wake-up. Best effort.
    pub fn cancel(&self, handle: AlarmHandle) {
        info!(%handle, "removing alarm");
        self.facility.cancel(handle);
    }

    /// Cancel every pending wake-up. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let pending = self.facility.pending();
        for handle in &pending {
            self.cancel(*handle);
        }
        pending.len()
    }
}
