//! # Shared Memory Bridge
//!
//! The shared-memory boundary between the real-time control process
//! and the non-real-time supervisory process: a single fixed-name
//! mapped region carrying two seqlock-protected snapshots, one per
//! direction, plus a heartbeat timestamp per side.
//!
//! ## Performance
//!
//! - Reads are wait-free apart from seqlock retries; writes never block a reader.
//! - No dynamic allocation on the read or write path once the region is mapped.
//! - Cache-line aligned snapshots (`#[repr(C, align(64))]`) avoid false sharing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vantage_shm::bridge::BridgeRegion;
//!
//! // RT side, at startup:
//! let mut region = BridgeRegion::create("/vantage_bridge").expect("create bridge");
//! region.publish_rt_snapshot(|snap| {
//!     snap.robot_mode = 1;
//!     snap.timestamp_ns = 0;
//! });
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ShmError>`:
//!
//! ```rust,no_run
//! use vantage_shm::bridge::BridgeRegion;
//! use vantage_shm::ShmError;
//!
//! match BridgeRegion::attach("/vantage_bridge") {
//!     Ok(region) => { /* use region */ }
//!     Err(ShmError::Io { source }) => eprintln!("bridge attach failed: {source}"),
//!     Err(e) => eprintln!("unexpected error: {e}"),
//! }
//! ```
//!
//! ## Platform Support
//!
//! Linux only: the region relies on `mmap`-backed POSIX shared memory
//! and NUMA/huge-page tuning with no portable equivalent.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod error;
pub mod platform;

pub use bridge::{BridgeRegion, BridgeSide, NonRtToRtSnapshot, RtToNonRtSnapshot};
pub use error::{ShmError, ShmResult};

/// Initialize tracing for RT-safe logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
