//! Executive configuration, loaded from the RT process's TOML file.

use serde::{Deserialize, Serialize};

/// Configuration for a single cyclic executive.
///
/// # TOML Example
///
/// ```toml
/// [executive]
/// periods_ms = [10, 50, 100]
/// cpu_core = 2
/// rt_priority = 80
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutiveConfig {
    /// Periods, in milliseconds, of every action the executive will run.
    pub periods_ms: Vec<u64>,
    /// CPU core the cyclic executive thread is pinned to.
    pub cpu_core: usize,
    /// `SCHED_FIFO` priority used when the `rt` feature is enabled.
    pub rt_priority: i32,
}

impl ExecutiveConfig {
    /// Validate the configuration beyond what `ScheduleParams::calculate`
    /// checks (an empty or zero period is caught there instead, since
    /// it is also a scheduling-level invariant).
    pub fn validate(&self) -> Result<(), vantage_common::config::ConfigError> {
        if !(0..=99).contains(&self.rt_priority) {
            return Err(vantage_common::config::ConfigError::ValidationError(
                format!("rt_priority {} must be in 0..=99", self.rt_priority),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rt_priority_out_of_range_rejected() {
        let cfg = ExecutiveConfig {
            periods_ms: vec![10],
            cpu_core: 0,
            rt_priority: 150,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn in_range_priority_accepted() {
        let cfg = ExecutiveConfig {
            periods_ms: vec![10, 50],
            cpu_core: 2,
            rt_priority: 80,
        };
        assert!(cfg.validate().is_ok());
    }
}
