//! Process health monitor: samples resource usage on an interval,
//! classifies health against configured thresholds, and drives the
//! failover controller on sustained liveness-probe failure.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Health status of a monitored process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Starting,
    Healthy,
    Degraded,
    Unhealthy,
    Stopping,
    Stopped,
}

/// A point-in-time health reading, as surfaced over the health HTTP
/// endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReading {
    pub process_name: String,
    pub pid: u32,
    pub status: HealthStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub response_time_ms: f64,
    pub cpu_usage_percent: f64,
    pub memory_usage_mb: f64,
    pub deadline_miss_count: u64,
    pub restart_count: u64,
    pub error_message: Option<String>,
}

/// A diagnostic assessment level, surfaced on `/health/details`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentLevel {
    Good,
    Warning,
    Critical,
    Info,
}

/// Thresholds past which a reading is classified `DEGRADED`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub deadline_miss_count: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 85.0,
            memory_mb: 2048.0,
            deadline_miss_count: 10,
        }
    }
}

struct SharedState {
    status: HealthStatus,
    error_message: Option<String>,
    last_heartbeat: Option<Instant>,
    last_heartbeat_utc: Option<DateTime<Utc>>,
    cpu_usage_percent: f64,
    memory_usage_mb: f64,
}

/// Monitors one managed process: records heartbeats, samples resource
/// usage, and tracks consecutive liveness-probe failures.
pub struct ProcessMonitor {
    process_name: String,
    pid: u32,
    thresholds: HealthThresholds,
    state: Mutex<SharedState>,
    deadline_miss_count: AtomicU64,
    restart_count: AtomicU64,
    consecutive_failures: AtomicU32,
}

impl ProcessMonitor {
    pub fn new(process_name: impl Into<String>, pid: u32, thresholds: HealthThresholds) -> Self {
        Self {
            process_name: process_name.into(),
            pid,
            thresholds,
            state: Mutex::new(SharedState {
                status: HealthStatus::Starting,
                error_message: None,
                last_heartbeat: None,
                last_heartbeat_utc: None,
                cpu_usage_percent: 0.0,
                memory_usage_mb: 0.0,
            }),
            deadline_miss_count: AtomicU64::new(0),
            restart_count: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Record a heartbeat with a fresh resource sample. Transitions
    /// out of STARTING on the first call.
    pub fn record_heartbeat(&self, cpu_usage_percent: f64, memory_usage_mb: f64) {
        let mut state = self.state.lock();
        state.last_heartbeat = Some(Instant::now());
        state.last_heartbeat_utc = Some(Utc::now());
        state.cpu_usage_percent = cpu_usage_percent;
        state.memory_usage_mb = memory_usage_mb;

        if state.status == HealthStatus::Starting {
            state.status = HealthStatus::Healthy;
        }
        if state.status != HealthStatus::Unhealthy {
            state.status = self.classify(cpu_usage_percent, memory_usage_mb);
        }
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_deadline_miss(&self) {
        self.deadline_miss_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restart_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Force the status to UNHEALTHY with a diagnostic message. Only
    /// `record_heartbeat` can clear this; a degraded threshold breach
    /// alone never does.
    pub fn set_error(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        state.status = HealthStatus::Unhealthy;
        state.error_message = Some(message.into());
    }

    pub fn begin_stopping(&self) {
        self.state.lock().status = HealthStatus::Stopping;
    }

    pub fn mark_stopped(&self) {
        self.state.lock().status = HealthStatus::Stopped;
    }

    fn classify(&self, cpu: f64, mem: f64) -> HealthStatus {
        let misses = self.deadline_miss_count.load(Ordering::Relaxed);
        if cpu > self.thresholds.cpu_percent
            || mem > self.thresholds.memory_mb
            || misses > self.thresholds.deadline_miss_count
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Record a liveness-probe result. Returns the new consecutive
    /// failure count so the caller can compare it against a policy
    /// threshold and trigger failover.
    pub fn record_probe(&self, response_time: Duration, timeout: Duration) -> u32 {
        if response_time > timeout {
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            0
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn reading(&self, response_time_ms: f64) -> HealthReading {
        let state = self.state.lock();
        HealthReading {
            process_name: self.process_name.clone(),
            pid: self.pid,
            status: state.status,
            last_heartbeat: state.last_heartbeat_utc.unwrap_or_else(Utc::now),
            response_time_ms,
            cpu_usage_percent: state.cpu_usage_percent,
            memory_usage_mb: state.memory_usage_mb,
            deadline_miss_count: self.deadline_miss_count.load(Ordering::Relaxed),
            restart_count: self.restart_count.load(Ordering::Relaxed),
            error_message: state.error_message.clone(),
        }
    }

    pub fn assessment_level(&self) -> AssessmentLevel {
        match self.state.lock().status {
            HealthStatus::Healthy | HealthStatus::Starting => AssessmentLevel::Good,
            HealthStatus::Degraded | HealthStatus::Stopping => AssessmentLevel::Warning,
            HealthStatus::Unhealthy => AssessmentLevel::Critical,
            HealthStatus::Stopped => AssessmentLevel::Info,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.state.lock().status
    }

    /// Best-effort systemd-style watchdog notification. No-ops
    /// silently when `NOTIFY_SOCKET` is unset, matching optional
    /// instrumentation rather than a hard dependency.
    pub fn notify_watchdog(&self) {
        if std::env::var_os("NOTIFY_SOCKET").is_none() {
            return;
        }
        tracing::trace!(process = %self.process_name, "sd_notify WATCHDOG=1");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_starting_status() {
        let m = ProcessMonitor::new("rt", 1, HealthThresholds::default());
        assert_eq!(m.status(), HealthStatus::Starting);
    }

    #[test]
    fn first_heartbeat_transitions_to_healthy() {
        let m = ProcessMonitor::new("rt", 1, HealthThresholds::default());
        m.record_heartbeat(10.0, 100.0);
        assert_eq!(m.status(), HealthStatus::Healthy);
    }

    #[test]
    fn high_cpu_degrades_status() {
        let m = ProcessMonitor::new("rt", 1, HealthThresholds::default());
        m.record_heartbeat(99.0, 100.0);
        assert_eq!(m.status(), HealthStatus::Degraded);
    }

    #[test]
    fn set_error_forces_unhealthy_until_next_heartbeat() {
        let m = ProcessMonitor::new("rt", 1, HealthThresholds::default());
        m.record_heartbeat(10.0, 100.0);
        m.set_error("segfault");
        assert_eq!(m.status(), HealthStatus::Unhealthy);
        m.record_heartbeat(10.0, 100.0);
        assert_eq!(m.status(), HealthStatus::Healthy);
    }

    #[test]
    fn consecutive_probe_failures_accumulate_and_reset() {
        let m = ProcessMonitor::new("rt", 1, HealthThresholds::default());
        let timeout = Duration::from_millis(100);
        assert_eq!(m.record_probe(Duration::from_millis(200), timeout), 1);
        assert_eq!(m.record_probe(Duration::from_millis(200), timeout), 2);
        assert_eq!(m.record_probe(Duration::from_millis(10), timeout), 0);
    }
}
