//! The bridge synchronizer: two independent threads running on the
//! configured tick cadence. The reader republishes the RT plane's
//! latest snapshot into data-store cells and feeds the process
//! monitor's heartbeat; the writer publishes the current commanded
//! setpoints. A torn read is skipped, not treated as a write of stale
//! data, and logged at trace level.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use vantage_events::{EventPayload, EventPriority, PrioritizedEvent, PriorityQueue};
use vantage_ha::{FailureType, HAStateMachine, ProcessMonitor};
use vantage_shm::bridge::BridgeRegion;
use vantage_store::{CellValue, DataStore, ExpirationPolicy};

fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

/// Commanded setpoints published to the RT plane on every writer tick.
#[derive(Debug, Clone, Copy)]
pub struct ControlSetpoints {
    pub max_velocity: f32,
    pub pid_kp: f32,
    pub pid_ki: f32,
    pub pid_kd: f32,
}

impl Default for ControlSetpoints {
    fn default() -> Self {
        Self {
            max_velocity: 1.0,
            pid_kp: 1.0,
            pid_ki: 0.0,
            pid_kd: 0.0,
        }
    }
}

/// Spawn the reader thread: republishes `rt_to_nonrt` into the data
/// store and records a heartbeat on the process monitor.
pub fn spawn_reader(
    bridge: Arc<Mutex<BridgeRegion>>,
    store: Arc<DataStore>,
    monitor: Arc<ProcessMonitor>,
    events: Arc<PriorityQueue>,
    ha: Arc<HAStateMachine>,
    deadline_miss_threshold: u64,
    heartbeat_timeout_ns: u64,
    tick: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut last_miss_count: u64 = 0;
        let mut failure_reported = false;
        while running.load(Ordering::Relaxed) {
            let bridge_guard = bridge.lock();
            match bridge_guard.read_rt_snapshot() {
                Ok(snapshot) => {
                    let _ = store.set(
                        "robot.position_x",
                        CellValue::from(snapshot.position_x as f64),
                        ExpirationPolicy::Never,
                    );
                    let _ = store.set(
                        "robot.velocity",
                        CellValue::from(snapshot.velocity as f64),
                        ExpirationPolicy::Never,
                    );
                    let _ = store.set(
                        "robot.mode",
                        CellValue::from(snapshot.robot_mode as i64),
                        ExpirationPolicy::Never,
                    );
                    monitor.record_heartbeat(0.0, 0.0);

                    if snapshot.deadline_miss_count > last_miss_count {
                        for _ in 0..(snapshot.deadline_miss_count - last_miss_count) {
                            monitor.record_deadline_miss();
                        }
                        last_miss_count = snapshot.deadline_miss_count;
                    } else if snapshot.deadline_miss_count < last_miss_count {
                        // RT side restarted and its counter reset with it.
                        last_miss_count = snapshot.deadline_miss_count;
                        failure_reported = false;
                    }

                    if last_miss_count >= deadline_miss_threshold && !failure_reported {
                        failure_reported = true;
                        if let Err(e) = ha.handle_failure(FailureType::DeadlineMissConsecutive) {
                            tracing::warn!(error = %e, "failed to report consecutive deadline misses");
                        }
                    }
                }
                Err(e) => {
                    tracing::trace!(error = ?e, "torn read of rt snapshot, skipping this tick");
                }
            }
            if !bridge_guard.peer_alive(heartbeat_timeout_ns) {
                events.push(PrioritizedEvent::new(
                    "rt_peer_unreachable",
                    EventPriority::Critical,
                    EventPayload::Text("RT process heartbeat stale".to_string()),
                    now_ns(),
                ));
            }
            drop(bridge_guard);
            std::thread::sleep(tick);
        }
    })
}

/// Spawn the writer thread: publishes the current commanded setpoints
/// into `nonrt_to_rt` on every tick.
pub fn spawn_writer(
    bridge: Arc<Mutex<BridgeRegion>>,
    setpoints: Arc<Mutex<ControlSetpoints>>,
    tick: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            let sp = *setpoints.lock();
            bridge.lock().publish_nonrt_snapshot(|snap| {
                snap.max_velocity = sp.max_velocity;
                snap.pid_kp = sp.pid_kp;
                snap.pid_ki = sp.pid_ki;
                snap.pid_kd = sp.pid_kd;
            });
            std::thread::sleep(tick);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use vantage_events::PriorityQueue;
    use vantage_ha::{HAStateMachine, HealthThresholds, RecoveryPolicy};

    #[test]
    fn default_setpoints_are_sane() {
        let sp = ControlSetpoints::default();
        assert!(sp.max_velocity > 0.0);
    }

    #[test]
    fn reader_escalates_to_ha_once_deadline_miss_threshold_crossed() {
        let name = format!("/vantage_nonrt_test_{}", std::process::id());
        let mut rt = BridgeRegion::create(&name).unwrap();
        rt.publish_rt_snapshot(|s| s.deadline_miss_count = 5);

        let nonrt = Arc::new(Mutex::new(BridgeRegion::attach(&name).unwrap()));
        let store = Arc::new(DataStore::new());
        let monitor = Arc::new(ProcessMonitor::new("vantage_rt", 0, HealthThresholds::default()));
        let events = Arc::new(PriorityQueue::new(16));
        let recoveries = Arc::new(AtomicU32::new(0));
        let recoveries2 = recoveries.clone();
        let ha = Arc::new(HAStateMachine::new(
            RecoveryPolicy::default(),
            Box::new(|_, _, _| {}),
            Box::new(move |_, _| {
                recoveries2.fetch_add(1, Ordering::Relaxed);
                true
            }),
        ));
        let running = Arc::new(AtomicBool::new(true));

        let handle = spawn_reader(
            nonrt,
            store,
            monitor.clone(),
            events,
            ha,
            3,
            5_000_000_000,
            Duration::from_millis(5),
            running.clone(),
        );
        std::thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(recoveries.load(Ordering::Relaxed) >= 1);
        assert!(monitor.reading(0.0).deadline_miss_count >= 5);
    }
}
