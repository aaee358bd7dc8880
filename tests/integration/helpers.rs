//! Shared fakes and harness for integration tests.

use async_trait::async_trait;
use dripfetch::alarm::{AlarmFacility, AlarmHandle, AlarmRequest, AlarmScheduler};
use dripfetch::app_dirs::DataPaths;
use dripfetch::clock::ManualClock;
use dripfetch::config::ServiceConfig;
use dripfetch::store::document::load_record;
use dripfetch::store::{BlobWriter, FileBlobStore, SettingsStore, StatusRecord, StatusStore};
use dripfetch::transport::{ConnectivityProbe, InfoResponse, NetworkClient};
use dripfetch::{Collaborators, FetchError, FetchOrchestrator, LifecycleAdapter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Fixed start time for every harness clock.
pub(crate) const START_MS: u64 = 1_700_000_000_000;

/// Alarm facility that records every call.
#[derive(Default)]
pub(crate) struct RecordingAlarms {
    next_id: AtomicU64,
    pending: Mutex<Vec<(AlarmHandle, AlarmRequest)>>,
    sets: Mutex<Vec<AlarmRequest>>,
    cancels: Mutex<Vec<AlarmHandle>>,
    refuse: AtomicBool,
}

impl RecordingAlarms {
    pub(crate) fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub(crate) fn sets(&self) -> Vec<AlarmRequest> {
        self.sets.lock().unwrap().clone()
    }

    pub(crate) fn cancels(&self) -> Vec<AlarmHandle> {
        self.cancels.lock().unwrap().clone()
    }

    pub(crate) fn pending_requests(&self) -> Vec<AlarmRequest> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }
}

impl AlarmFacility for RecordingAlarms {
    fn set(&self, request: AlarmRequest) -> Option<AlarmHandle> {
        self.sets.lock().unwrap().push(request.clone());
        if self.refuse.load(Ordering::SeqCst) {
            return None;
        }
        let handle = AlarmHandle(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.pending.lock().unwrap().push((handle, request));
        Some(handle)
    }

    fn pending(&self) -> Vec<AlarmHandle> {
        self.pending.lock().unwrap().iter().map(|(h, _)| *h).collect()
    }

    fn cancel(&self, handle: AlarmHandle) {
        self.cancels.lock().unwrap().push(handle);
        self.pending.lock().unwrap().retain(|(h, _)| *h != handle);
    }
}

/// Probe with a switchable answer, optionally held until the test
/// releases it.
pub(crate) struct StaticProbe {
    connected: AtomicBool,
    checks: AtomicUsize,
    gated: AtomicBool,
    gate: Notify,
}

impl StaticProbe {
    pub(crate) fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            checks: AtomicUsize::new(0),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
        }
    }

    pub(crate) fn set(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.gate.notify_one();
    }

    pub(crate) fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_connected(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        self.connected.load(Ordering::SeqCst)
    }
}

/// What the scripted client answers.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Body(&'static str),
    Fail,
}

/// A request seen by the scripted client, with the status document as it
/// was on disk at that moment.
#[derive(Debug, Clone)]
pub(crate) struct SeenRequest {
    pub(crate) url: String,
    pub(crate) status_on_disk: StatusRecord,
}

/// Network client returning a scripted reply, optionally held until the
/// test releases it.
pub(crate) struct ScriptedClient {
    reply: Mutex<Reply>,
    status_path: PathBuf,
    seen: Mutex<Vec<SeenRequest>>,
    gated: AtomicBool,
    gate: Notify,
}

impl ScriptedClient {
    fn new(status_path: PathBuf) -> Self {
        Self {
            reply: Mutex::new(Reply::Body(r#"{"temp":5.5}"#)),
            status_path,
            seen: Mutex::new(Vec::new()),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
        }
    }

    pub(crate) fn reply_with(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Hold every later request until [`release`](Self::release).
    pub(crate) fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Let one held request complete.
    pub(crate) fn release(&self) {
        self.gate.notify_one();
    }

    pub(crate) fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl NetworkClient for ScriptedClient {
    async fn get(&self, url: &str) -> dripfetch::Result<InfoResponse> {
        let status_on_disk: StatusRecord = load_record(&self.status_path);
        self.seen.lock().unwrap().push(SeenRequest {
            url: url.to_owned(),
            status_on_disk,
        });

        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Body(body) => Ok(InfoResponse {
                status: 200,
                body: body.as_bytes().to_vec(),
            }),
            Reply::Fail => Err(FetchError::Transport("connection reset".to_owned())),
        }
    }
}

/// Blob writer that always fails.
pub(crate) struct BrokenBlob;

impl BlobWriter for BrokenBlob {
    fn write_blob(&self, _bytes: &[u8]) -> dripfetch::Result<()> {
        Err(FetchError::Storage("disk full".to_owned()))
    }
}

/// Fakes plus a temp data directory, wired the way the host wires them.
pub(crate) struct Harness {
    pub(crate) dir: tempfile::TempDir,
    pub(crate) config: ServiceConfig,
    pub(crate) paths: DataPaths,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) alarms: Arc<RecordingAlarms>,
    pub(crate) probe: Arc<StaticProbe>,
    pub(crate) client: Arc<ScriptedClient>,
    pub(crate) blob: Option<Arc<dyn BlobWriter>>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = ServiceConfig::default();
        config.server.base_url = "http://watch.local:29863".to_owned();
        config.paths.data_dir = Some(dir.path().to_path_buf());
        let paths = DataPaths::under(dir.path());

        Self {
            client: Arc::new(ScriptedClient::new(paths.status.clone())),
            dir,
            config,
            paths,
            clock: Arc::new(ManualClock::new(START_MS)),
            alarms: Arc::new(RecordingAlarms::default()),
            probe: Arc::new(StaticProbe::new(true)),
            blob: None,
        }
    }

    pub(crate) fn with_blob(mut self, blob: Arc<dyn BlobWriter>) -> Self {
        self.blob = Some(blob);
        self
    }

    pub(crate) fn parts(&self) -> Collaborators {
        let blob: Arc<dyn BlobWriter> = match &self.blob {
            Some(blob) => Arc::clone(blob),
            None => Arc::new(FileBlobStore::new(self.paths.info.clone())),
        };
        Collaborators {
            status: StatusStore::open(self.paths.status.clone()),
            settings: SettingsStore::open(self.paths.settings.clone()),
            blob,
            alarms: AlarmScheduler::new(self.alarms.clone()),
            probe: self.probe.clone(),
            client: self.client.clone(),
            clock: self.clock.clone(),
        }
    }

    pub(crate) fn orchestrator(&self) -> Arc<FetchOrchestrator> {
        Arc::new(FetchOrchestrator::new(
            self.parts(),
            &self.config,
            CancellationToken::new(),
        ))
    }

    pub(crate) fn adapter(&self) -> LifecycleAdapter {
        LifecycleAdapter::new(self.parts(), &self.config)
    }

    /// Status document as currently persisted.
    pub(crate) fn status_on_disk(&self) -> StatusRecord {
        load_record(&self.paths.status)
    }

    pub(crate) fn write_settings(&self, json: &str) {
        std::fs::write(&self.paths.settings, json).expect("write settings");
    }

    pub(crate) fn write_status(&self, record: &StatusRecord) {
        let json = serde_json::to_vec(record).expect("encode status");
        std::fs::write(&self.paths.status, json).expect("write status");
    }

    /// Wait until the scripted client has seen `n` requests.
    pub(crate) async fn wait_for_calls(&self, n: usize) {
        wait_until(|| self.client.calls() >= n, "requests").await;
    }

    /// Wait until the probe has been asked `n` times.
    pub(crate) async fn wait_for_probes(&self, n: usize) {
        wait_until(|| self.probe.checks() >= n, "link probes").await;
    }
}

async fn wait_until(done: impl Fn() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !done() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
