//! Lifecycle adapter between the host shell and the orchestrator.
//!
//! The host calls [`on_init`](LifecycleAdapter::on_init) once when it starts
//! the service, [`on_event`](LifecycleAdapter::on_event) for every later
//! wake-up, and [`on_destroy`](LifecycleAdapter::on_destroy) before it tears
//! the process down. Each dispatch runs as a tracked task, so overlapping
//! wake-ups really overlap and `on_destroy` can wait for all of them to
//! persist their status and arm their alarm.

use super::orchestrator::{Collaborators, CycleOutcome, FetchOrchestrator};
use crate::command::Command;
use crate::config::ServiceConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Owns the process's single [`FetchOrchestrator`].
pub struct LifecycleAdapter {
    orchestrator: Arc<FetchOrchestrator>,
    tracker: TaskTracker,
    exit: CancellationToken,
}

impl LifecycleAdapter {
    pub fn new(parts: Collaborators, config: &ServiceConfig) -> Self {
        let exit = CancellationToken::new();
        let orchestrator = FetchOrchestrator::new(parts, config, exit.clone());
        Self {
            orchestrator: Arc::new(orchestrator),
            tracker: TaskTracker::new(),
            exit,
        }
    }

    /// Service started by the host.
    pub fn on_init(&self, payload: Option<&str>) -> JoinHandle<CycleOutcome> {
        info!(payload = payload.unwrap_or("<none>"), "service init");
        self.dispatch(payload)
    }

    /// Wake-up delivered to a running service.
    pub fn on_event(&self, payload: Option<&str>) -> JoinHandle<CycleOutcome> {
        info!(payload = payload.unwrap_or("<none>"), "service event");
        self.dispatch(payload)
    }

    /// Wait until every dispatched command has settled.
    ///
    /// After this returns the status document is persisted and the next
    /// alarm (if any) is armed, so the host may exit.
    pub async fn on_destroy(&self) {
        info!(in_flight = self.tracker.len(), "service destroy, waiting for dispatches");
        self.tracker.close();
        self.tracker.wait().await;
        debug!("all dispatches settled");
    }

    /// Whether the service asked the host to exit.
    #[must_use]
    pub fn exit_requested(&self) -> bool {
        self.exit.is_cancelled()
    }

    /// Token cancelled when the service asks the host to exit.
    #[must_use]
    pub fn exit_signal(&self) -> CancellationToken {
        self.exit.clone()
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<FetchOrchestrator> {
        &self.orchestrator
    }

    fn dispatch(&self, payload: Option<&str>) -> JoinHandle<CycleOutcome> {
        let command = Command::decode(payload);
        debug!(%command, "decoded command");
        let orchestrator = Arc::clone(&self.orchestrator);
        self.tracker.spawn(async move {
            let outcome = orchestrator.handle(command).await;
            info!(%command, %outcome, requested = outcome.requested(), "command handled");
            outcome
        })
    }
}
