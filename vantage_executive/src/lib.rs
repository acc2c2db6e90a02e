//! # Cyclic Executive
//!
//! Deterministic rate-monotonic scheduler for the real-time control
//! plane: a major/minor frame derived from a set of action periods,
//! absolute-time wakeups, and zero heap allocation once the cycle
//! starts running.
//!
//! ## Modules
//!
//! - [`schedule`] — major/minor cycle derivation (gcd/lcm)
//! - [`cycle`] — the cyclic executive runtime and RT setup sequence
//! - [`config`] — executive configuration loaded from TOML
//! - [`error`] — executive-local error type

#![deny(clippy::disallowed_types)]

pub mod config;
pub mod cycle;
pub mod error;
pub mod schedule;
