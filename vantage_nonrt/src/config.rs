//! Non-RT process configuration, loaded from a single TOML file
//! sharing the `[runtime]` table with the RT process's config.

use serde::{Deserialize, Serialize};
use vantage_common::config::SharedConfig;
use vantage_ha::{CheckpointConfig, SupervisorConfig};

/// Top-level Non-RT process configuration.
///
/// # TOML Example
///
/// ```toml
/// [runtime]
/// log_level = "info"
/// service_name = "vantage-nonrt"
/// bridge_name = "/vantage_bridge"
///
/// [supervisor]
/// health_check_interval_ms = 1000
/// health_probe_timeout_ms = 200
/// health_http_addr = "127.0.0.1:9100"
///
/// [checkpoint]
/// directory = "/var/lib/vantage/checkpoints"
/// max_checkpoints = 10
/// retention_hours = 24
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonRtConfig {
    pub runtime: SharedConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

impl NonRtConfig {
    pub fn validate(&self) -> Result<(), vantage_common::config::ConfigError> {
        self.runtime.validate()?;
        self.supervisor.validate()
    }
}
