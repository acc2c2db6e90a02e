//! Failover controller: decides whether a failed process may be
//! restarted within its policy's rolling window, and drives the
//! restart sequence including optional state recovery from the
//! checkpoint store.

use crate::checkpoint::{CheckpointStore, StateCheckpoint};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use vantage_common::error::CoreError;

/// Restart budget and timing for a single managed process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverPolicy {
    pub max_restart_count: u32,
    pub restart_window_secs: u64,
    pub restart_delay_ms: u64,
    pub recovery_enabled: bool,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self {
            max_restart_count: 5,
            restart_window_secs: 60,
            restart_delay_ms: 1000,
            recovery_enabled: true,
        }
    }
}

/// Tracks restart attempts within the policy's rolling window.
struct RestartLedger {
    count: u32,
    window_start: Instant,
}

impl RestartLedger {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn window_expired(&self, window: Duration) -> bool {
        self.window_start.elapsed() >= window
    }
}

/// A restart action, invoked by [`FailoverController::trigger_restart`]
/// to actually bring the process back up.
pub trait RestartTarget: Send + Sync {
    fn restart(&self, checkpoint: Option<&StateCheckpoint>) -> Result<(), CoreError>;
}

/// Decides and executes restarts under a [`FailoverPolicy`].
pub struct FailoverController {
    process_name: String,
    policy: FailoverPolicy,
    ledger: parking_lot::Mutex<RestartLedger>,
    checkpoints: Option<CheckpointStore>,
}

impl FailoverController {
    pub fn new(process_name: impl Into<String>, policy: FailoverPolicy, checkpoints: Option<CheckpointStore>) -> Self {
        Self {
            process_name: process_name.into(),
            policy,
            ledger: parking_lot::Mutex::new(RestartLedger::new()),
            checkpoints,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.policy.restart_window_secs)
    }

    /// True iff the rolling window has expired (count resets to zero)
    /// or the count so far is below the policy's ceiling.
    pub fn can_restart(&self) -> bool {
        let ledger = self.ledger.lock();
        ledger.window_expired(self.window()) || ledger.count < self.policy.max_restart_count
    }

    /// The current restart count, `0` once the window has expired.
    pub fn restart_count(&self) -> u32 {
        let ledger = self.ledger.lock();
        if ledger.window_expired(self.window()) {
            0
        } else {
            ledger.count
        }
    }

    /// Handle a reported process failure: either abandon (the caller
    /// should raise an alert) or run the restart sequence.
    pub fn handle_process_failure(&self, target: &dyn RestartTarget, recover_state: bool) -> Result<(), CoreError> {
        if !self.can_restart() {
            tracing::error!(process = %self.process_name, "restart budget exhausted, abandoning");
            return Err(CoreError::PolicyInvalid(format!(
                "restart budget exhausted for `{}`",
                self.process_name
            )));
        }
        self.trigger_restart(target, recover_state)
    }

    pub fn trigger_restart(&self, target: &dyn RestartTarget, recover_state: bool) -> Result<(), CoreError> {
        {
            let mut ledger = self.ledger.lock();
            if ledger.window_expired(self.window()) {
                ledger.count = 0;
                ledger.window_start = Instant::now();
            }
            ledger.count += 1;
        }

        std::thread::sleep(Duration::from_millis(self.policy.restart_delay_ms));

        let checkpoint = if recover_state && self.policy.recovery_enabled {
            match &self.checkpoints {
                Some(store) => match store.load_latest() {
                    Ok(cp) => cp,
                    Err(e) => {
                        tracing::warn!(process = %self.process_name, error = %e, "failed to load checkpoint, restarting without state");
                        None
                    }
                },
                None => None,
            }
        } else {
            None
        };

        tracing::warn!(process = %self.process_name, restart_count = self.restart_count(), "restarting process");
        target.restart(checkpoint.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingTarget(AtomicU32);

    impl RestartTarget for CountingTarget {
        fn restart(&self, _checkpoint: Option<&StateCheckpoint>) -> Result<(), CoreError> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn fast_policy(max: u32, window_secs: u64) -> FailoverPolicy {
        FailoverPolicy {
            max_restart_count: max,
            restart_window_secs: window_secs,
            restart_delay_ms: 0,
            recovery_enabled: false,
        }
    }

    #[test]
    fn allows_restarts_up_to_budget() {
        let controller = FailoverController::new("rt", fast_policy(3, 60), None);
        let target = CountingTarget(AtomicU32::new(0));
        for _ in 0..3 {
            controller.handle_process_failure(&target, false).unwrap();
        }
        assert_eq!(target.0.load(Ordering::Relaxed), 3);
        assert!(!controller.can_restart());
    }

    #[test]
    fn rejects_restart_past_budget_within_window() {
        let controller = FailoverController::new("rt", fast_policy(1, 60), None);
        let target = CountingTarget(AtomicU32::new(0));
        controller.handle_process_failure(&target, false).unwrap();
        assert!(controller.handle_process_failure(&target, false).is_err());
    }

    #[test]
    fn window_expiry_resets_count() {
        let controller = FailoverController::new("rt", fast_policy(1, 0), None);
        let target = CountingTarget(AtomicU32::new(0));
        controller.handle_process_failure(&target, false).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(controller.restart_count(), 0);
        assert!(controller.can_restart());
    }
}
