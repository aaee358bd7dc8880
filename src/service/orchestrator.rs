//! Fetch orchestrator: the service's state machine.
//!
//! One instance lives for the whole process. Each command either starts a
//! fetch cycle, is absorbed by the in-flight guard, or stops the service.
//!
//! # Fetch cycle
//!
//! 1. Record the attempt in the status document and persist it, before any
//!    network I/O, so a crash leaves an "attempt without success" behind.
//! 2. Probe the link. If it is down, record `no_transport` and re-arm.
//! 3. Issue exactly one `GET` for the info document.
//! 4. Store a non-empty body and mark success.
//! 5. Finalize: derive `lastError`, persist, arm the next alarm, clear the
//!    in-flight flag. This runs whatever happened in 3 and 4. Once the
//!    service is stopped no alarm is armed.
//!
//! File I/O runs on the blocking pool; only the request itself is awaited on
//! the runtime.
//!
//! # In-flight guard
//!
//! While a cycle is running, further `Start`/`Update` commands do nothing,
//! unless the running attempt is older than the stale threshold. Then a
//! short alarm is armed and recovery happens on that later wake-up: it
//! starts a new cycle in place of the stuck one. A superseded cycle that
//! finally returns still records its result but leaves the guard and the
//! alarm to the cycle that replaced it.

use crate::alarm::{AlarmFacility, AlarmHandle, AlarmScheduler};
use crate::app_dirs::DataPaths;
use crate::clock::Clock;
use crate::command::Command;
use crate::config::{ScheduleConfig, ServerConfig, ServiceConfig};
use crate::error::{FetchError, Result};
use crate::store::{
    BlobWriter, ERROR_NO_TRANSPORT, FileBlobStore, SettingsStore, StatusRecord, StatusStore,
};
use crate::transport::{
    ConnectivityProbe, HttpInfoClient, NetworkClient, TcpConnectivityProbe, info_url,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a handled command ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Payload stored, status marked successful.
    Fetched,
    /// Server answered with an empty body.
    NoData,
    /// Request failed or the payload could not be stored.
    Failed,
    /// Link was down; no request was made.
    NoTransport,
    /// A cycle is already running and is not stale.
    InFlight,
    /// A stale cycle was detected and a recovery alarm armed.
    StaleRecovered,
    /// Service stopped; the host was asked to exit.
    Stopped,
    /// Nothing to do (unknown command, or already stopped).
    Ignored,
}

impl CycleOutcome {
    /// Whether this outcome issued a network request.
    #[must_use]
    pub fn requested(self) -> bool {
        matches!(self, Self::Fetched | Self::NoData | Self::Failed)
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fetched => "fetched",
            Self::NoData => "no_data",
            Self::Failed => "failed",
            Self::NoTransport => "no_transport",
            Self::InFlight => "in_flight",
            Self::StaleRecovered => "stale_recovered",
            Self::Stopped => "stopped",
            Self::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

/// Everything the orchestrator talks to.
pub struct Collaborators {
    pub status: StatusStore,
    pub settings: SettingsStore,
    pub blob: Arc<dyn BlobWriter>,
    pub alarms: AlarmScheduler,
    pub probe: Arc<dyn ConnectivityProbe>,
    pub client: Arc<dyn NetworkClient>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Default wiring: documents under the configured data directory, a TCP
    /// link probe and an HTTP client for the configured server.
    pub fn file_backed(
        config: &ServiceConfig,
        alarms: Arc<dyn AlarmFacility>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let paths = DataPaths::under(&config.data_dir());
        let probe = TcpConnectivityProbe::for_base_url(
            &config.server.base_url,
            config.server.probe_timeout(),
        )
        .ok_or_else(|| {
            FetchError::Config(format!(
                "cannot derive host and port from base URL {}",
                config.server.base_url
            ))
        })?;

        Ok(Self {
            status: StatusStore::open(paths.status),
            settings: SettingsStore::open(paths.settings),
            blob: Arc::new(FileBlobStore::new(paths.info)),
            alarms: AlarmScheduler::new(alarms),
            probe: Arc::new(probe),
            client: Arc::new(HttpInfoClient::new(&config.server)),
            clock,
        })
    }
}

/// The fetch state machine.
pub struct FetchOrchestrator {
    status: Mutex<StatusStore>,
    settings: Mutex<SettingsStore>,
    blob: Arc<dyn BlobWriter>,
    alarms: AlarmScheduler,
    probe: Arc<dyn ConnectivityProbe>,
    client: Arc<dyn NetworkClient>,
    clock: Arc<dyn Clock>,
    server: ServerConfig,
    schedule: ScheduleConfig,
    updating_data: AtomicBool,
    recovery_armed: AtomicBool,
    cycle: AtomicU64,
    stopped: AtomicBool,
    exit: CancellationToken,
}

impl FetchOrchestrator {
    /// Build the orchestrator. `exit` is cancelled when a `Stop` is handled.
    pub fn new(parts: Collaborators, config: &ServiceConfig, exit: CancellationToken) -> Self {
        Self {
            status: Mutex::new(parts.status),
            settings: Mutex::new(parts.settings),
            blob: parts.blob,
            alarms: parts.alarms,
            probe: parts.probe,
            client: parts.client,
            clock: parts.clock,
            server: config.server.clone(),
            schedule: config.schedule.clone(),
            updating_data: AtomicBool::new(false),
            recovery_armed: AtomicBool::new(false),
            cycle: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            exit,
        }
    }

    /// Handle one decoded command.
    pub async fn handle(&self, command: Command) -> CycleOutcome {
        if self.is_stopped() {
            info!(%command, "service stopped, ignoring command");
            return CycleOutcome::Ignored;
        }

        match command {
            Command::Start | Command::Update => self.attempt_fetch_cycle().await,
            Command::Stop => self.stop().await,
            Command::Unknown => {
                info!("unknown command, nothing to do");
                CycleOutcome::Ignored
            }
        }
    }

    /// Whether a fetch is believed to be in flight.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating_data.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Token cancelled when the service asks the host to exit.
    #[must_use]
    pub fn exit_signal(&self) -> CancellationToken {
        self.exit.clone()
    }

    /// Copy of the in-memory status record.
    pub async fn status(&self) -> StatusRecord {
        self.status.lock().await.data().clone()
    }

    async fn attempt_fetch_cycle(&self) -> CycleOutcome {
        if self
            .updating_data
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return self.check_in_flight().await;
        }

        self.fetch_info().await
    }

    async fn check_in_flight(&self) -> CycleOutcome {
        let now = self.clock.now_ms();
        let (stale, age_ms) = {
            let status = self.status.lock().await;
            let record = status.data();
            (
                record.attempt_is_stale(now, self.schedule.stale_threshold_secs),
                record.attempt_age_ms(now),
            )
        };

        if !stale {
            debug!(age_ms, "fetch already in flight");
            return CycleOutcome::InFlight;
        }

        // The first stale wake-up only arms the recovery alarm; the one after
        // it takes the guard over from the stuck cycle.
        if self.recovery_armed.swap(true, Ordering::SeqCst) {
            warn!(age_ms, "stuck fetch not recovered, starting a new cycle");
            return self.fetch_info().await;
        }

        warn!(age_ms, "fetch in flight looks stuck, re-arming recovery alarm");
        self.arm_next_alarm().await;
        CycleOutcome::StaleRecovered
    }

    /// Runs with `updating_data` held by the caller.
    async fn fetch_info(&self) -> CycleOutcome {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        self.recovery_armed.store(false, Ordering::SeqCst);
        info!(cycle, "starting fetch cycle");
        {
            let mut status = self.status.lock().await;
            status.data_mut().begin_attempt(self.clock.now_ms());
            persist(&status).await;
        }

        if !self.probe.is_connected().await {
            warn!(cycle, "no transport link, skipping request");
            {
                let mut status = self.status.lock().await;
                status.data_mut().last_error = ERROR_NO_TRANSPORT.to_owned();
                persist(&status).await;
            }
            self.release_cycle(cycle).await;
            return CycleOutcome::NoTransport;
        }

        let extended = {
            let mut settings = self.settings.lock().await;
            settings.reload_async().await;
            settings.data().extended_graph_requested
        };
        let url = info_url(&self.server, extended);
        info!(cycle, %url, extended, "requesting info");

        let outcome = match self.client.get(&url).await {
            Ok(resp) if !resp.has_body() => {
                info!(status = resp.status, "no data in response");
                CycleOutcome::NoData
            }
            Ok(resp) => {
                debug!(status = resp.status, bytes = resp.body.len(), "info received");
                match self.store_blob(resp.body).await {
                    Ok(()) => {
                        let mut status = self.status.lock().await;
                        status.data_mut().mark_success(self.clock.now_ms());
                        CycleOutcome::Fetched
                    }
                    Err(e) => {
                        error!(error = %e, "cannot store info payload");
                        CycleOutcome::Failed
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "fetch error");
                CycleOutcome::Failed
            }
        };

        self.finalize(cycle).await;
        outcome
    }

    async fn finalize(&self, cycle: u64) {
        let success = {
            let mut status = self.status.lock().await;
            status.data_mut().settle_error();
            persist(&status).await;
            status.data().last_update_success
        };
        if !success {
            warn!(cycle, "update failed");
        }
        self.release_cycle(cycle).await;
    }

    /// Arm the next alarm and drop the in-flight guard, unless the service
    /// stopped meanwhile or a newer cycle took the guard over.
    async fn release_cycle(&self, cycle: u64) {
        if self.cycle.load(Ordering::SeqCst) != cycle {
            info!(cycle, "cycle superseded by a recovery cycle, leaving guard and alarm to it");
            return;
        }
        if self.is_stopped() {
            info!(cycle, "service stopped during cycle, not re-arming");
        } else {
            self.arm_next_alarm().await;
        }
        self.recovery_armed.store(false, Ordering::SeqCst);
        self.updating_data.store(false, Ordering::SeqCst);
    }

    async fn store_blob(&self, body: Vec<u8>) -> Result<()> {
        let blob = Arc::clone(&self.blob);
        tokio::task::spawn_blocking(move || blob.write_blob(&body))
            .await
            .map_err(|e| FetchError::Storage(format!("blob write task failed: {e}")))?
    }

    async fn stop(&self) -> CycleOutcome {
        info!("stopping service");
        self.stopped.store(true, Ordering::SeqCst);
        let alarms = self.alarms.clone();
        match tokio::task::spawn_blocking(move || alarms.cancel_all()).await {
            Ok(cancelled) => debug!(cancelled, "pending alarms cancelled"),
            Err(e) => error!(error = %e, "alarm cancellation task failed"),
        }
        self.exit.cancel();
        CycleOutcome::Stopped
    }

    async fn arm_next_alarm(&self) -> Option<AlarmHandle> {
        let alarms = self.alarms.clone();
        let delay_secs = self.schedule.retry_delay_secs;
        let armed = tokio::task::spawn_blocking(move || alarms.schedule(delay_secs, Command::Update))
            .await
            .map_err(|e| FetchError::Scheduling(format!("alarm task failed: {e}")))
            .and_then(|r| r);
        match armed {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(error = %e, "service will not wake again until re-armed externally");
                None
            }
        }
    }
}

async fn persist(status: &StatusStore) {
    if let Err(e) = status.save_async().await {
        error!(error = %e, "cannot persist status");
    }
}
