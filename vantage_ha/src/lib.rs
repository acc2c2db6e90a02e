//! # HA Supervisor
//!
//! Three cooperating parts, wired together by the Non-RT process:
//!
//! - [`monitor`] — [`monitor::ProcessMonitor`], resource/health sampling
//! - [`failover`] — [`failover::FailoverController`], restart budget and sequencing
//! - [`checkpoint`] — [`checkpoint::CheckpointStore`], on-disk state snapshots
//! - [`state_machine`] — [`state_machine::HAStateMachine`], the operational-mode graph
//! - [`health_http`] — [`health_http::HealthServer`], the loopback probe endpoints
//! - [`config`] — TOML-loadable supervisor and checkpoint settings

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod failover;
pub mod health_http;
pub mod monitor;
pub mod state_machine;

pub use checkpoint::{CheckpointStore, StateCheckpoint};
pub use config::{CheckpointConfig, SupervisorConfig};
pub use failover::{FailoverController, FailoverPolicy, RestartTarget};
pub use health_http::HealthServer;
pub use monitor::{AssessmentLevel, HealthReading, HealthStatus, HealthThresholds, ProcessMonitor};
pub use state_machine::{FailureType, HAState, HAStateMachine, RecoveryAction, RecoveryPolicy};
