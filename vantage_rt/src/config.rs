//! RT process configuration, loaded from a single TOML file shared
//! between the `[runtime]` and `[executive]` tables.

use serde::{Deserialize, Serialize};
use vantage_common::config::SharedConfig;
use vantage_executive::config::ExecutiveConfig;

/// Top-level RT process configuration.
///
/// # TOML Example
///
/// ```toml
/// [runtime]
/// log_level = "info"
/// service_name = "vantage-rt"
/// bridge_name = "/vantage_bridge"
///
/// [executive]
/// periods_ms = [10, 50]
/// cpu_core = 2
/// rt_priority = 80
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtConfig {
    pub runtime: SharedConfig,
    pub executive: ExecutiveConfig,
}

impl RtConfig {
    pub fn validate(&self) -> Result<(), vantage_common::config::ConfigError> {
        self.runtime.validate()?;
        self.executive.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config_passes() {
        let cfg = RtConfig {
            runtime: SharedConfig {
                log_level: vantage_common::config::LogLevel::Info,
                service_name: "vantage-rt".to_string(),
                bridge_name: "/vantage_bridge".to_string(),
            },
            executive: ExecutiveConfig {
                periods_ms: vec![10, 50],
                cpu_core: 2,
                rt_priority: 80,
            },
        };
        assert!(cfg.validate().is_ok());
    }
}
