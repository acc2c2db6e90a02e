//! Executive-local error handling.
//!
//! The cyclic executive raises its own [`crate::cycle::CycleError`] and
//! [`crate::schedule::ScheduleError`] for scheduling concerns; callers
//! crossing into the rest of the runtime convert those into the shared
//! [`vantage_common::error::CoreError`] hierarchy.

pub use vantage_common::error::{CoreError, CoreResult};

impl From<crate::cycle::CycleError> for CoreError {
    fn from(e: crate::cycle::CycleError) -> Self {
        match e {
            crate::cycle::CycleError::CycleOverrun {
                actual_ns,
                budget_ns,
            } => CoreError::Deadline {
                actual_ns,
                budget_ns,
            },
            other => CoreError::TransientIO(other.to_string()),
        }
    }
}

impl From<crate::schedule::ScheduleError> for CoreError {
    fn from(e: crate::schedule::ScheduleError) -> Self {
        CoreError::PolicyInvalid(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleError;

    #[test]
    fn cycle_overrun_maps_to_deadline() {
        let err: CoreError = CycleError::CycleOverrun {
            actual_ns: 100,
            budget_ns: 50,
        }
        .into();
        assert!(matches!(err, CoreError::Deadline { .. }));
    }
}
