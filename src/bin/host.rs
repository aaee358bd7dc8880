//! Host shell for the fetch service.
//!
//! Plays the part of the device's app-service host: it starts the service
//! with an initial payload, fires alarms from the persisted alarm table as
//! they come due, and exits when the service asks it to (or on Ctrl-C),
//! after every in-flight dispatch has settled.
//!
//! All tracing output goes to stderr; stdout carries command output only.

use clap::{Parser, Subcommand};
use dripfetch::alarm::{FETCH_SERVICE_TARGET, FileAlarmFacility};
use dripfetch::app_dirs::{DataPaths, logs_dir};
use dripfetch::clock::{Clock, SystemClock};
use dripfetch::store::StatusRecord;
use dripfetch::store::document::load_record;
use dripfetch::{Collaborators, LifecycleAdapter, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on how long the run loop sleeps before re-reading the alarm
/// table, so alarms written by other processes are picked up.
const MAX_IDLE_WAIT: Duration = Duration::from_secs(5);

/// Host shell for the dripfetch periodic-fetch service.
#[derive(Parser)]
#[command(name = "dripfetch-host", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write a daily-rolling log file under the data directory.
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: HostCommand,
}

#[derive(Subcommand)]
enum HostCommand {
    /// Start the service and keep delivering alarms until it stops.
    Run {
        /// Initial payload handed to the service.
        #[arg(long, default_value = "start")]
        payload: String,
    },
    /// Deliver a single wake-up event and exit once it settles.
    Wake {
        /// Event payload, e.g. `{"action":"update"}` or `stop`.
        #[arg(long)]
        payload: Option<String>,
    },
    /// Print the status document and pending alarms.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ServiceConfig::default_config_path);
    let config = ServiceConfig::load_or_default(&config_path)?;
    let data_dir = config.data_dir();

    let log_dir = cli.log_file.then(|| logs_dir(&data_dir));
    let _log_guard = dripfetch::logging::init(log_dir.as_deref());
    debug!(config = %config_path.display(), data = %data_dir.display(), "host starting");

    match cli.command {
        HostCommand::Run { payload } => run(&config, &payload).await,
        HostCommand::Wake { payload } => wake(&config, payload.as_deref()).await,
        HostCommand::Status => print_status(&config),
    }
}

struct Host {
    adapter: LifecycleAdapter,
    alarms: Arc<FileAlarmFacility>,
    clock: Arc<dyn Clock>,
}

fn build_host(config: &ServiceConfig) -> anyhow::Result<Host> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let paths = DataPaths::under(&config.data_dir());
    let alarms = Arc::new(FileAlarmFacility::new(paths.alarms, Arc::clone(&clock)));
    let parts = Collaborators::file_backed(config, alarms.clone(), Arc::clone(&clock))?;
    Ok(Host {
        adapter: LifecycleAdapter::new(parts, config),
        alarms,
        clock,
    })
}

async fn run(config: &ServiceConfig, payload: &str) -> anyhow::Result<()> {
    let host = build_host(config)?;
    let exit = host.adapter.exit_signal();
    host.adapter.on_init(Some(payload));

    loop {
        let now = host.clock.now_ms();
        let wait = host
            .alarms
            .next_due()
            .map(|due| Duration::from_millis(due.saturating_sub(now)))
            .unwrap_or(MAX_IDLE_WAIT)
            .min(MAX_IDLE_WAIT);

        tokio::select! {
            _ = exit.cancelled() => {
                info!("service requested exit");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = tokio::time::sleep(wait) => {
                let alarms = Arc::clone(&host.alarms);
                let now = host.clock.now_ms();
                let due = tokio::task::spawn_blocking(move || alarms.take_due(now)).await?;
                for alarm in due {
                    if alarm.target != FETCH_SERVICE_TARGET {
                        debug!(alarm_target = %alarm.target, "skipping alarm for another service");
                        continue;
                    }
                    info!(handle = %alarm.id, "alarm fired");
                    host.adapter.on_event(Some(alarm.payload.as_str()));
                }
            }
        }
    }

    host.adapter.on_destroy().await;
    info!("host shut down cleanly");
    Ok(())
}

async fn wake(config: &ServiceConfig, payload: Option<&str>) -> anyhow::Result<()> {
    let host = build_host(config)?;
    let outcome = host.adapter.on_event(payload).await?;
    host.adapter.on_destroy().await;
    println!("{outcome}");
    Ok(())
}

fn print_status(config: &ServiceConfig) -> anyhow::Result<()> {
    let paths = DataPaths::under(&config.data_dir());
    let status: StatusRecord = load_record(&paths.status);
    let alarms = FileAlarmFacility::new(paths.alarms, Arc::new(SystemClock));

    let pending: Vec<_> = alarms
        .list()
        .into_iter()
        .map(|a| {
            serde_json::json!({
                "id": a.id,
                "dueAt": format_epoch_ms(a.due_at_ms),
                "payload": a.payload,
            })
        })
        .collect();

    let attempt_at = format_epoch_ms(status.last_update_attempt);
    let update_at = format_epoch_ms(status.last_update);
    let report = serde_json::json!({
        "status": status,
        "lastUpdateAttemptAt": attempt_at,
        "lastUpdateAt": update_at,
        "pendingAlarms": pending,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn format_epoch_ms(ms: u64) -> Option<String> {
    if ms == 0 {
        return None;
    }
    let millis = i64::try_from(ms).ok()?;
    chrono::DateTime::from_timestamp_millis(millis).map(|t| t.to_rfc3339())
}
