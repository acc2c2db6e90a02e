//! Major/minor frame derivation for the cyclic executive.
//!
//! Given the set of action periods an executive must service, the
//! minor cycle is their GCD (the scheduler's base tick) and the major
//! cycle is their LCM (after which the whole schedule repeats). Every
//! action runs on some subset of the `num_slots` minor ticks within a
//! major cycle.

use vantage_common::consts::MAX_MAJOR_CYCLE_MS;

/// Derived timing parameters for a cyclic executive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleParams {
    /// Base tick of the schedule, in milliseconds.
    pub minor_cycle_ms: u64,
    /// Full repeat period of the schedule, in milliseconds.
    pub major_cycle_ms: u64,
    /// Number of minor-cycle slots per major cycle.
    pub num_slots: u64,
}

/// A period could not be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// No periods were given.
    #[error("at least one action period is required")]
    Empty,

    /// A period was zero.
    #[error("action period must be non-zero")]
    ZeroPeriod,

    /// The computed major cycle exceeds the configured ceiling.
    #[error("major cycle {computed_ms}ms exceeds the {limit_ms}ms ceiling")]
    MajorCycleTooLong { computed_ms: u64, limit_ms: u64 },
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

impl ScheduleParams {
    /// Derive the minor/major cycle and slot count from a set of action
    /// periods, in milliseconds. Rejects schedules whose major cycle
    /// would exceed [`MAX_MAJOR_CYCLE_MS`].
    pub fn calculate(periods_ms: &[u64]) -> Result<Self, ScheduleError> {
        if periods_ms.is_empty() {
            return Err(ScheduleError::Empty);
        }
        if periods_ms.iter().any(|&p| p == 0) {
            return Err(ScheduleError::ZeroPeriod);
        }

        let minor_cycle_ms = periods_ms.iter().copied().reduce(gcd).unwrap();
        let major_cycle_ms = periods_ms.iter().copied().reduce(lcm).unwrap();

        if major_cycle_ms > MAX_MAJOR_CYCLE_MS {
            return Err(ScheduleError::MajorCycleTooLong {
                computed_ms: major_cycle_ms,
                limit_ms: MAX_MAJOR_CYCLE_MS,
            });
        }

        Ok(Self {
            minor_cycle_ms,
            major_cycle_ms,
            num_slots: major_cycle_ms / minor_cycle_ms,
        })
    }

    /// Whether an action with the given period should run on `slot`
    /// (0-indexed, wrapping every `num_slots`).
    pub fn action_due(&self, period_ms: u64, slot: u64) -> bool {
        let stride = period_ms / self.minor_cycle_ms;
        stride > 0 && slot % stride == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_period_is_its_own_cycle() {
        let sched = ScheduleParams::calculate(&[10]).unwrap();
        assert_eq!(sched.minor_cycle_ms, 10);
        assert_eq!(sched.major_cycle_ms, 10);
        assert_eq!(sched.num_slots, 1);
    }

    #[test]
    fn mixed_periods_derive_gcd_and_lcm() {
        let sched = ScheduleParams::calculate(&[10, 50, 100]).unwrap();
        assert_eq!(sched.minor_cycle_ms, 10);
        assert_eq!(sched.major_cycle_ms, 100);
        assert_eq!(sched.num_slots, 10);
    }

    #[test]
    fn empty_periods_rejected() {
        assert_eq!(ScheduleParams::calculate(&[]), Err(ScheduleError::Empty));
    }

    #[test]
    fn zero_period_rejected() {
        assert_eq!(
            ScheduleParams::calculate(&[10, 0]),
            Err(ScheduleError::ZeroPeriod)
        );
    }

    #[test]
    fn major_cycle_over_ceiling_rejected() {
        let err = ScheduleParams::calculate(&[3, 1000]).unwrap_err();
        assert!(matches!(err, ScheduleError::MajorCycleTooLong { .. }));
    }

    #[test]
    fn action_due_respects_stride() {
        let sched = ScheduleParams::calculate(&[10, 50]).unwrap();
        assert!(sched.action_due(10, 0));
        assert!(sched.action_due(10, 1));
        assert!(sched.action_due(50, 0));
        assert!(!sched.action_due(50, 1));
        assert!(sched.action_due(50, 5));
    }
}
