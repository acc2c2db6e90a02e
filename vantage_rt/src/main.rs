//! # Vantage RT Process
//!
//! The real-time control plane: a cyclic executive driving two
//! actions — a fast control loop reading setpoints from the hot-key
//! cache, and a slower bridge-sync action that exchanges snapshots
//! with the Non-RT process over shared memory.
//!
//! ```bash
//! vantage_rt --config /etc/vantage/config/rt.toml
//! ```

mod config;
mod control;

use clap::Parser;
use config::RtConfig;
use control::ControlState;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use vantage_common::config::{ConfigLoader, LogLevel};
use vantage_executive::cycle::{CyclicExecutive, rt_setup};
use vantage_shm::bridge::BridgeRegion;
use vantage_store::HotKeyCache;

#[derive(Parser, Debug)]
#[command(name = "vantage_rt")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Real-time control process")]
struct Args {
    /// Path to the RT process configuration file.
    #[arg(short, long, default_value = "/etc/vantage/config/rt.toml")]
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
        error!("RT process startup failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = RtConfig::load(&args.config)?;
    config.validate()?;

    setup_tracing(config.runtime.log_level, args.verbose);
    info!(service = %config.runtime.service_name, "vantage_rt starting");

    rt_setup(config.executive.cpu_core, config.executive.rt_priority)?;
    info!(
        cpu_core = config.executive.cpu_core,
        rt_priority = config.executive.rt_priority,
        "RT scheduling setup complete"
    );

    let bridge = Arc::new(Mutex::new(BridgeRegion::create(&config.runtime.bridge_name)?));
    info!(bridge_name = %config.runtime.bridge_name, "bridge region created");

    let mut hotkeys = HotKeyCache::<f32>::new();
    let idx_max_velocity = hotkeys.register("max_velocity", 1.0)?;
    let idx_pid_kp = hotkeys.register("pid_kp", 1.0)?;
    let hotkeys = Arc::new(hotkeys);

    let mut executive = CyclicExecutive::new(&config.executive.periods_ms)?;
    // `ScheduleParams::calculate` above already rejects an empty period list.
    let fast_period_ms = *config.executive.periods_ms.first().unwrap();
    let sync_period_ms = *config.executive.periods_ms.last().unwrap();

    {
        let bridge = bridge.clone();
        let hotkeys = hotkeys.clone();
        executive.register_action("bridge_sync", sync_period_ms, move |_ctx| {
            let bridge = bridge.lock();
            match bridge.read_nonrt_snapshot() {
                Ok(snapshot) => {
                    hotkeys.set(idx_max_velocity, snapshot.max_velocity.max(0.0));
                    hotkeys.set(idx_pid_kp, snapshot.pid_kp);
                }
                Err(e) => {
                    tracing::trace!(error = ?e, "torn read of nonrt snapshot, skipping this cycle");
                }
            }
            if !bridge.peer_alive(vantage_common::consts::HEARTBEAT_TIMEOUT_NS) {
                tracing::warn!("Non-RT peer heartbeat stale");
            }
        });
    }

    {
        let bridge = bridge.clone();
        let hotkeys = hotkeys.clone();
        let mut state = ControlState::new();
        let dt_s = fast_period_ms as f32 / 1000.0;
        executive.register_action("control_loop", fast_period_ms, move |ctx| {
            let max_velocity = hotkeys.get(idx_max_velocity);
            let pid_kp = hotkeys.get(idx_pid_kp);
            state.step(dt_s, max_velocity, pid_kp);

            let overruns = ctx.overruns;
            let mut bridge = bridge.lock();
            bridge.publish_rt_snapshot(|snap| {
                snap.robot_mode = state.mode as i32;
                snap.position_x = state.position;
                snap.position_y = 0.0;
                snap.velocity = state.velocity;
                snap.deadline_miss_count = overruns;
            });
        });
    }

    info!("entering cyclic executive loop");
    executive.run()?;
    Ok(())
}
