//! Supervisor-side configuration, loaded from the Non-RT process's
//! TOML file alongside the shared `[runtime]` table.

use crate::failover::FailoverPolicy;
use crate::monitor::HealthThresholds;
use serde::{Deserialize, Serialize};

/// The `[supervisor]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub health_check_interval_ms: u64,
    pub health_probe_timeout_ms: u64,
    pub health_http_addr: String,
    #[serde(default)]
    pub thresholds: HealthThresholds,
    #[serde(default)]
    pub failover: FailoverPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: 1000,
            health_probe_timeout_ms: 200,
            health_http_addr: "127.0.0.1:9100".to_string(),
            thresholds: HealthThresholds::default(),
            failover: FailoverPolicy::default(),
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<(), vantage_common::config::ConfigError> {
        if self.health_check_interval_ms == 0 {
            return Err(vantage_common::config::ConfigError::ValidationError(
                "health_check_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// The `[checkpoint]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub directory: String,
    pub max_checkpoints: usize,
    pub retention_hours: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            directory: "/var/lib/vantage/checkpoints".to_string(),
            max_checkpoints: 10,
            retention_hours: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_rejected() {
        let mut cfg = SupervisorConfig::default();
        cfg.health_check_interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_are_valid() {
        assert!(SupervisorConfig::default().validate().is_ok());
    }
}
