//! Real HTTP client, link probe and file-backed wiring against a mock server.

use dripfetch::alarm::{FETCH_SERVICE_TARGET, FileAlarmFacility};
use dripfetch::app_dirs::DataPaths;
use dripfetch::clock::{Clock, ManualClock};
use dripfetch::config::ServerConfig;
use dripfetch::store::{ERROR_NO_TRANSPORT, ERROR_UPDATE_FAILED, StatusRecord};
use dripfetch::store::document::load_record;
use dripfetch::transport::{
    ConnectivityProbe, HttpInfoClient, NetworkClient, TcpConnectivityProbe, info_url,
};
use dripfetch::{Collaborators, Command, CycleOutcome, FetchError, LifecycleAdapter, ServiceConfig};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START_MS: u64 = 1_700_000_000_000;

fn server_config(base_url: String) -> ServerConfig {
    ServerConfig {
        base_url,
        request_timeout_secs: 1,
        ..ServerConfig::default()
    }
}

// ── HttpInfoClient ────────────────────────────────────────────────

#[tokio::test]
async fn client_returns_body_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"bg":112}"#))
        .expect(1)
        .mount(&server)
        .await;

    let config = server_config(server.uri());
    let client = HttpInfoClient::new(&config);
    let resp = client
        .get(&info_url(&config, false))
        .await
        .unwrap_or_else(|e| panic!("Expected Ok, got Err: {e}"));

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, br#"{"bg":112}"#);
}

#[tokio::test]
async fn client_maps_server_error_to_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let config = server_config(server.uri());
    let client = HttpInfoClient::new(&config);
    let err = client.get(&info_url(&config, false)).await.unwrap_err();

    match err {
        FetchError::Transport(msg) => assert!(msg.contains("500"), "unexpected message: {msg}"),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_gives_up_after_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = server_config(server.uri());
    let client = HttpInfoClient::new(&config);
    let err = client.get(&info_url(&config, false)).await.unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)), "got {err:?}");
}

// ── TcpConnectivityProbe ──────────────────────────────────────────

#[tokio::test]
async fn probe_sees_running_server() {
    let server = MockServer::start().await;
    let probe = TcpConnectivityProbe::for_base_url(&server.uri(), Duration::from_millis(500))
        .expect("mock server uri has host and port");
    assert!(probe.is_connected().await);
}

// ── File-backed wiring ────────────────────────────────────────────

struct Wired {
    _dir: tempfile::TempDir,
    paths: DataPaths,
    clock: Arc<ManualClock>,
    alarms: Arc<FileAlarmFacility>,
    adapter: LifecycleAdapter,
}

fn wire(base_url: String) -> Wired {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = ServiceConfig::default();
    config.server = server_config(base_url);
    config.server.probe_timeout_ms = 300;
    config.paths.data_dir = Some(dir.path().to_path_buf());

    let paths = DataPaths::under(dir.path());
    let clock = Arc::new(ManualClock::new(START_MS));
    let shared_clock: Arc<dyn Clock> = clock.clone();
    let alarms = Arc::new(FileAlarmFacility::new(
        paths.alarms.clone(),
        Arc::clone(&shared_clock),
    ));
    let parts = Collaborators::file_backed(&config, alarms.clone(), shared_clock)
        .expect("base url is valid");

    Wired {
        _dir: dir,
        paths,
        clock,
        alarms,
        adapter: LifecycleAdapter::new(parts, &config),
    }
}

#[tokio::test]
async fn end_to_end_cycle_persists_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"bg":98}"#))
        .mount(&server)
        .await;

    let w = wire(server.uri());
    let outcome = w.adapter.on_init(Some("start")).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Fetched);
    w.adapter.on_destroy().await;

    let status: StatusRecord = load_record(&w.paths.status);
    assert!(status.last_update_success);
    assert_eq!(status.last_update, START_MS);
    assert_eq!(std::fs::read_to_string(&w.paths.info).unwrap(), r#"{"bg":98}"#);

    let pending = w.alarms.list();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].target, FETCH_SERVICE_TARGET);
    assert_eq!(pending[0].due_at_ms, START_MS + 60_000);
    assert_eq!(Command::decode(Some(pending[0].payload.as_str())), Command::Update);
}

#[tokio::test]
async fn end_to_end_due_alarm_drives_next_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(2)
        .mount(&server)
        .await;

    let w = wire(server.uri());
    w.adapter.on_init(Some("start")).await.unwrap();

    assert!(w.alarms.take_due(w.clock.now_ms()).is_empty());
    w.clock.advance_secs(60);
    let due = w.alarms.take_due(w.clock.now_ms());
    assert_eq!(due.len(), 1);

    let outcome = w
        .adapter
        .on_event(Some(due[0].payload.as_str()))
        .await
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Fetched);
    assert_eq!(w.alarms.list().len(), 1);
}

#[tokio::test]
async fn end_to_end_extended_query_sent_when_requested() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info.json"))
        .and(query_param("graph", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"graph":[1,2]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let w = wire(server.uri());
    std::fs::write(&w.paths.settings, r#"{"extendedGraphRequested":true}"#).unwrap();

    let outcome = w.adapter.on_init(Some("update")).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Fetched);
}

#[tokio::test]
async fn end_to_end_server_error_records_sentinel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let w = wire(server.uri());
    let outcome = w.adapter.on_init(Some("update")).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Failed);

    let status: StatusRecord = load_record(&w.paths.status);
    assert_eq!(status.last_error, ERROR_UPDATE_FAILED);
    assert!(!w.paths.info.exists());
    assert_eq!(w.alarms.list().len(), 1);
}

#[tokio::test]
async fn end_to_end_unreachable_server_is_no_transport() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let w = wire(format!("http://127.0.0.1:{port}"));
    let outcome = w.adapter.on_init(Some("update")).await.unwrap();
    assert_eq!(outcome, CycleOutcome::NoTransport);

    let status: StatusRecord = load_record(&w.paths.status);
    assert_eq!(status.last_error, ERROR_NO_TRANSPORT);
    assert_eq!(w.alarms.list().len(), 1);
}
