//! Prelude module for common re-exports.
//!
//! Consumers can do `use vantage_common::prelude::*;` and get the most
//! commonly used types without listing individual paths.

pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::consts::{
    BRIDGE_SYNC_TICK_MS, DEFAULT_COALESCE_WINDOW_MS, DEFAULT_QUEUE_CAPACITY, HEARTBEAT_TIMEOUT_NS,
    MAX_HOT_KEYS, MAX_MAJOR_CYCLE_MS, MAX_READ_RETRIES,
};
pub use crate::error::{CoreError, CoreResult};
