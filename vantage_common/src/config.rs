//! Configuration loading traits and types.
//!
//! Standardized TOML configuration loading shared by the RT and Non-RT
//! binaries: a `[runtime]` table common to both, deserialized through
//! a blanket `ConfigLoader` impl so any serde-deserializable process
//! config struct gets `load()`/`validate()` for free.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vantage_common::config::{ConfigLoader, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     runtime: SharedConfig,
//! }
//!
//! let config = AppConfig::load(Path::new("config.toml")).expect("load config");
//! println!("service: {}", config.runtime.service_name);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Log level for configuration (feeds `tracing_subscriber::EnvFilter`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The `tracing`/`EnvFilter` directive string for this level.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Common configuration fields shared across both processes.
///
/// Embedded as the `[runtime]` table in both the RT and Non-RT process
/// configuration files.
///
/// # TOML Example
///
/// ```toml
/// [runtime]
/// log_level = "info"
/// service_name = "vantage-rt"
/// bridge_name = "/vantage_bridge"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Process name, used in logs and health-endpoint diagnostics.
    pub service_name: String,

    /// POSIX shared-memory region name (must start with `/`).
    pub bridge_name: String,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty
    /// or `bridge_name` does not start with `/`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        if !self.bridge_name.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "bridge_name `{}` must start with `/`",
                self.bridge_name
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    ///
    /// Callers that embed a `validate()`-bearing section (e.g.
    /// `SharedConfig`) should call it explicitly after `load()` — this
    /// trait only handles parsing, since semantic validation differs
    /// per concrete config type.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        runtime: SharedConfig,
    }

    #[test]
    fn load_missing_file_is_file_not_found() {
        let err = TestConfig::load(Path::new("/nonexistent/path.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound));
    }

    #[test]
    fn load_malformed_toml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not valid = = toml").unwrap();
        let err = TestConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_valid_toml_round_trips() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [runtime]
            log_level = "debug"
            service_name = "test-svc"
            bridge_name = "/test_bridge"
            "#
        )
        .unwrap();
        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.runtime.service_name, "test-svc");
        assert_eq!(config.runtime.log_level, LogLevel::Debug);
        config.runtime.validate().unwrap();
    }

    #[test]
    fn empty_service_name_fails_validation() {
        let cfg = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
            bridge_name: "/x".to_string(),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bridge_name_without_slash_fails_validation() {
        let cfg = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "svc".to_string(),
            bridge_name: "no_slash".to_string(),
        };
        assert!(cfg.validate().is_err());
    }
}
