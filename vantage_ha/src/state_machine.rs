//! HA state machine: maps failure types to recovery actions via a
//! loadable policy, executes the recovery callback, and transitions
//! through the legal state graph.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use vantage_common::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    RtProcessCrash,
    DeadlineMissConsecutive,
    EthercatCommFailure,
    SensorFailure,
    MotorOvercurrent,
    DatastoreCorruption,
    ConfigReloadFailure,
    HealthProbeTimeout,
    MemoryExhaustion,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryAction {
    EnterSafeMode,
    RestartRtProcess,
    ReloadConfiguration,
    NotifyAndWait,
    ShutdownSystem,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HAState {
    Normal,
    Degraded,
    SafeMode,
    RecoveryInProgress,
    ManualIntervention,
    Shutdown,
}

impl HAState {
    fn can_transition_to(self, target: HAState) -> bool {
        if self == target {
            return true;
        }
        use HAState::*;
        matches!(
            (self, target),
            (Normal, Degraded)
                | (Normal, RecoveryInProgress)
                | (Normal, SafeMode)
                | (Normal, Shutdown)
                | (Degraded, Normal)
                | (Degraded, RecoveryInProgress)
                | (Degraded, Shutdown)
                | (SafeMode, RecoveryInProgress)
                | (SafeMode, ManualIntervention)
                | (SafeMode, Shutdown)
                | (RecoveryInProgress, Normal)
                | (RecoveryInProgress, SafeMode)
                | (RecoveryInProgress, ManualIntervention)
                | (RecoveryInProgress, Shutdown)
                | (ManualIntervention, Normal)
                | (ManualIntervention, Shutdown)
        )
    }
}

/// `FailureType` to `RecoveryAction` mapping, loadable from the
/// recovery-policy TOML file described alongside the runtime config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    pub mapping: HashMap<FailureType, RecoveryAction>,
    pub max_recovery_attempts: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        use FailureType::*;
        use RecoveryAction::*;
        let mapping = HashMap::from([
            (RtProcessCrash, RestartRtProcess),
            (DeadlineMissConsecutive, EnterSafeMode),
            (EthercatCommFailure, EnterSafeMode),
            (SensorFailure, NotifyAndWait),
            (MotorOvercurrent, EnterSafeMode),
            (DatastoreCorruption, NotifyAndWait),
            (ConfigReloadFailure, ReloadConfiguration),
            (HealthProbeTimeout, RestartRtProcess),
            (MemoryExhaustion, ShutdownSystem),
            (Other, NotifyAndWait),
        ]);
        Self {
            mapping,
            max_recovery_attempts: 3,
        }
    }
}

fn target_state(failure: FailureType, action: RecoveryAction) -> HAState {
    use FailureType::*;
    if matches!(failure, DeadlineMissConsecutive | EthercatCommFailure | MotorOvercurrent) {
        return HAState::SafeMode;
    }
    match action {
        RecoveryAction::EnterSafeMode => HAState::SafeMode,
        RecoveryAction::RestartRtProcess | RecoveryAction::ReloadConfiguration => HAState::RecoveryInProgress,
        RecoveryAction::NotifyAndWait => HAState::ManualIntervention,
        RecoveryAction::ShutdownSystem => HAState::Shutdown,
        RecoveryAction::None => HAState::Degraded,
    }
}

/// Callback invoked once per attempted recovery; returns whether the
/// action actually succeeded.
pub type RecoveryCallback = Box<dyn Fn(FailureType, RecoveryAction) -> bool + Send + Sync>;
/// Callback invoked on every state transition, with the triggering
/// failure type for the ones that came from `handle_failure`.
pub type TransitionCallback = Box<dyn Fn(HAState, HAState, Option<FailureType>) + Send + Sync>;

struct Inner {
    state: HAState,
    attempts: u32,
}

/// The HA supervisor's top-level state machine.
pub struct HAStateMachine {
    policy: RecoveryPolicy,
    inner: Mutex<Inner>,
    on_transition: TransitionCallback,
    run_recovery: RecoveryCallback,
}

impl HAStateMachine {
    pub fn new(policy: RecoveryPolicy, on_transition: TransitionCallback, run_recovery: RecoveryCallback) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner {
                state: HAState::Normal,
                attempts: 0,
            }),
            on_transition,
            run_recovery,
        }
    }

    pub fn state(&self) -> HAState {
        self.inner.lock().unwrap().state
    }

    fn transition(&self, target: HAState, failure: Option<FailureType>) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.state.can_transition_to(target) {
            return Err(CoreError::InvalidTransition {
                from: format!("{:?}", inner.state),
                to: format!("{target:?}"),
            });
        }
        let from = inner.state;
        inner.state = target;
        drop(inner);
        if matches!(target, HAState::Shutdown | HAState::ManualIntervention) {
            tracing::error!(?from, to = ?target, ?failure, "HA state transition");
        } else {
            tracing::warn!(?from, to = ?target, ?failure, "HA state transition");
        }
        (self.on_transition)(from, target, failure);
        Ok(())
    }

    /// Handle a reported failure: look up its recovery action, run
    /// the recovery callback, and transition to the resulting state.
    pub fn handle_failure(&self, failure: FailureType) -> Result<(), CoreError> {
        let action = *self
            .policy
            .mapping
            .get(&failure)
            .ok_or_else(|| CoreError::PolicyInvalid(format!("no recovery action for {failure:?}")))?;

        let succeeded = (self.run_recovery)(failure, action);
        if !succeeded {
            self.report_recovery_failure(failure)?;
            return Ok(());
        }

        let target = target_state(failure, action);
        self.transition(target, Some(failure))
    }

    /// Reset attempt count and return to NORMAL.
    pub fn report_recovery_success(&self) -> Result<(), CoreError> {
        self.inner.lock().unwrap().attempts = 0;
        self.transition(HAState::Normal, None)
    }

    /// Increment the attempt count; once it reaches the policy's max,
    /// reset it and transition to MANUAL_INTERVENTION.
    pub fn report_recovery_failure(&self, failure: FailureType) -> Result<(), CoreError> {
        let exhausted = {
            let mut inner = self.inner.lock().unwrap();
            inner.attempts += 1;
            inner.attempts >= self.policy.max_recovery_attempts
        };
        if exhausted {
            self.inner.lock().unwrap().attempts = 0;
            self.transition(HAState::ManualIntervention, Some(failure))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(run_recovery_succeeds: bool) -> HAStateMachine {
        HAStateMachine::new(
            RecoveryPolicy::default(),
            Box::new(|_, _, _| {}),
            Box::new(move |_, _| run_recovery_succeeds),
        )
    }

    #[test]
    fn deadline_miss_always_goes_to_safe_mode() {
        let m = machine(true);
        m.handle_failure(FailureType::DeadlineMissConsecutive).unwrap();
        assert_eq!(m.state(), HAState::SafeMode);
    }

    #[test]
    fn three_consecutive_recovery_failures_reach_manual_intervention() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let succeed = Arc::new(AtomicBool::new(true));
        let succeed2 = succeed.clone();
        let m = HAStateMachine::new(
            RecoveryPolicy::default(),
            Box::new(|_, _, _| {}),
            Box::new(move |_, _| succeed2.load(Ordering::Relaxed)),
        );

        // NORMAL -> SAFE_MODE (forced by failure type, regardless of action).
        m.handle_failure(FailureType::DeadlineMissConsecutive).unwrap();
        assert_eq!(m.state(), HAState::SafeMode);

        // SAFE_MODE -> RECOVERY_IN_PROGRESS (HealthProbeTimeout maps to RestartRtProcess).
        m.handle_failure(FailureType::HealthProbeTimeout).unwrap();
        assert_eq!(m.state(), HAState::RecoveryInProgress);

        // Now fail recovery three times in a row from RECOVERY_IN_PROGRESS.
        succeed.store(false, Ordering::Relaxed);
        m.report_recovery_failure(FailureType::HealthProbeTimeout).unwrap();
        m.report_recovery_failure(FailureType::HealthProbeTimeout).unwrap();
        assert_eq!(m.state(), HAState::RecoveryInProgress);
        m.report_recovery_failure(FailureType::HealthProbeTimeout).unwrap();
        assert_eq!(m.state(), HAState::ManualIntervention);
    }

    #[test]
    fn recovery_success_returns_to_normal() {
        let m = machine(true);
        m.handle_failure(FailureType::DeadlineMissConsecutive).unwrap();
        // SAFE_MODE -> RECOVERY_IN_PROGRESS is legal, report success from there.
        m.report_recovery_success().unwrap_err();
        // Direct NORMAL->NORMAL no-op from a fresh machine is legal though:
        let fresh = machine(true);
        fresh.report_recovery_success().unwrap();
        assert_eq!(fresh.state(), HAState::Normal);
    }

    #[test]
    fn invalid_transition_rejected() {
        let m = machine(true);
        m.handle_failure(FailureType::DeadlineMissConsecutive).unwrap();
        assert_eq!(m.state(), HAState::SafeMode);
        // SAFE_MODE -> DEGRADED is not a legal transition.
        let err = m.transition(HAState::Degraded, None);
        assert!(matches!(err, Err(CoreError::InvalidTransition { .. })));
    }

    #[test]
    fn rt_process_crash_restarts_without_forcing_safe_mode() {
        let m = machine(true);
        m.handle_failure(FailureType::RtProcessCrash).unwrap();
        assert_eq!(m.state(), HAState::RecoveryInProgress);
    }

    #[test]
    fn datastore_corruption_notifies_and_waits_from_safe_mode() {
        let m = machine(true);
        // NORMAL -> SAFE_MODE first; NOTIFY_AND_WAIT's MANUAL_INTERVENTION
        // target is only reachable from SAFE_MODE or RECOVERY_IN_PROGRESS.
        m.handle_failure(FailureType::EthercatCommFailure).unwrap();
        assert_eq!(m.state(), HAState::SafeMode);
        m.handle_failure(FailureType::DatastoreCorruption).unwrap();
        assert_eq!(m.state(), HAState::ManualIntervention);
    }

    #[test]
    fn sensor_failure_from_normal_is_an_invalid_transition() {
        // NOTIFY_AND_WAIT's MANUAL_INTERVENTION target is not directly
        // reachable from NORMAL, matching the original state graph.
        let m = machine(true);
        let err = m.handle_failure(FailureType::SensorFailure);
        assert!(matches!(err, Err(CoreError::InvalidTransition { .. })));
    }

    #[test]
    fn unmapped_failure_type_fails() {
        let m = HAStateMachine::new(
            RecoveryPolicy { mapping: HashMap::new(), max_recovery_attempts: 3 },
            Box::new(|_, _, _| {}),
            Box::new(|_, _| true),
        );
        assert!(m.handle_failure(FailureType::Other).is_err());
    }
}
