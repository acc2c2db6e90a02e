//! # Vantage Non-RT Process
//!
//! The supervisory plane: attaches to the RT process's bridge region,
//! runs the bridge synchronizer, the event-plane consumer, and the HA
//! supervisor (process monitor, failover controller, checkpoint
//! store, state machine, health HTTP endpoints). Shuts down
//! cooperatively on SIGINT/SIGTERM.
//!
//! ```bash
//! vantage_nonrt --config /etc/vantage/config/nonrt.toml
//! ```

mod bridge_sync;
mod config;
mod event_consumer;
mod restart;

use bridge_sync::ControlSetpoints;
use clap::Parser;
use config::NonRtConfig;
use parking_lot::Mutex;
use restart::SystemdRestartTarget;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use vantage_common::config::{ConfigLoader, LogLevel};
use vantage_common::consts::{BRIDGE_SYNC_TICK_MS, DEFAULT_QUEUE_CAPACITY, HEARTBEAT_TIMEOUT_NS};
use vantage_events::{CoalescingPolicy, PriorityQueue};
use vantage_ha::{CheckpointStore, FailoverController, HAStateMachine, HealthServer, ProcessMonitor, RecoveryPolicy};
use vantage_shm::bridge::BridgeRegion;
use vantage_store::DataStore;

#[derive(Parser, Debug)]
#[command(name = "vantage_nonrt")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Non-real-time supervisory process")]
struct Args {
    /// Path to the Non-RT process configuration file.
    #[arg(short, long, default_value = "/etc/vantage/config/nonrt.toml")]
    config: PathBuf,

    /// Enable verbose (debug-level) logging, overriding the configured level.
    #[arg(short, long)]
    verbose: bool,
}

fn setup_tracing(level: LogLevel, verbose: bool) {
    let level = if verbose { Level::DEBUG } else { level.as_filter_str().parse().unwrap_or(Level::INFO) };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    if let Err(e) = run() {
        error!("Non-RT process startup failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = NonRtConfig::load(&args.config)?;
    config.validate()?;

    setup_tracing(config.runtime.log_level, args.verbose);
    info!(service = %config.runtime.service_name, "vantage_nonrt starting");

    let bridge = Arc::new(Mutex::new(BridgeRegion::attach(&config.runtime.bridge_name)?));
    info!(bridge_name = %config.runtime.bridge_name, "attached to bridge region");

    let store = Arc::new(DataStore::new());
    let monitor = Arc::new(ProcessMonitor::new("vantage_rt", 0, config.supervisor.thresholds));
    let events = Arc::new(PriorityQueue::new(DEFAULT_QUEUE_CAPACITY));
    let coalescing = Arc::new(CoalescingPolicy::default());
    let setpoints = Arc::new(Mutex::new(ControlSetpoints::default()));

    let checkpoints = CheckpointStore::new(config.checkpoint.directory.clone(), config.checkpoint.max_checkpoints)?;
    // A second handle over the same directory, used only for the periodic
    // retention sweep below; the failover controller owns the one it
    // restores from.
    let checkpoint_sweep = CheckpointStore::new(config.checkpoint.directory.clone(), config.checkpoint.max_checkpoints)?;
    let retention_hours = config.checkpoint.retention_hours;
    let failover = Arc::new(FailoverController::new(
        "vantage_rt",
        config.supervisor.failover.clone(),
        Some(checkpoints),
    ));
    let restart_target = SystemdRestartTarget::new("vantage-rt.service");

    let ha = Arc::new(HAStateMachine::new(
        RecoveryPolicy::default(),
        Box::new(|from, to, failure| {
            info!(?from, ?to, ?failure, "HA state transition");
        }),
        Box::new(move |_failure, _action| failover.handle_process_failure(&restart_target, true).is_ok()),
    ));

    let health_server = HealthServer::start(&config.supervisor.health_http_addr, monitor.clone())?;
    info!(addr = %config.supervisor.health_http_addr, "health server listening");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let tick = Duration::from_millis(BRIDGE_SYNC_TICK_MS);
    let reader = bridge_sync::spawn_reader(
        bridge.clone(),
        store.clone(),
        monitor.clone(),
        events.clone(),
        ha.clone(),
        config.supervisor.thresholds.deadline_miss_count,
        HEARTBEAT_TIMEOUT_NS,
        tick,
        running.clone(),
    );
    let writer = bridge_sync::spawn_writer(bridge.clone(), setpoints.clone(), tick, running.clone());
    let consumer = event_consumer::spawn(
        events.clone(),
        coalescing.clone(),
        ha.clone(),
        Duration::from_millis(20),
        running.clone(),
    );

    info!("vantage_nonrt running");
    let mut last_sweep = std::time::Instant::now();
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(200));
        if last_sweep.elapsed() >= Duration::from_secs(3600) {
            if let Err(e) = checkpoint_sweep.cleanup_expired(retention_hours) {
                tracing::warn!(error = %e, "checkpoint retention sweep failed");
            }
            last_sweep = std::time::Instant::now();
        }
    }

    monitor.begin_stopping();
    for handle in [reader, writer, consumer] {
        let _ = handle.join();
    }
    monitor.mark_stopped();
    health_server.stop();

    info!("vantage_nonrt shutdown complete");
    Ok(())
}
