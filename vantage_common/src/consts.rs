//! System-wide constants for the vantage workspace.
//!
//! Single source of truth for all numeric limits and default paths.
//! Imported by all crates — no duplication permitted.

/// Hard ceiling on hot-key cache capacity.
pub const MAX_HOT_KEYS: usize = 32;

/// Ceiling on a cyclic executive's major cycle, in milliseconds.
pub const MAX_MAJOR_CYCLE_MS: u64 = 1000;

/// Bound on seqlock optimistic-read retries before falling back to a
/// locked read.
pub const MAX_READ_RETRIES: u32 = 10;

/// Peer heartbeat timeout for the shared-memory bridge, in nanoseconds.
pub const HEARTBEAT_TIMEOUT_NS: u64 = 500_000_000;

/// Non-RT bridge synchronizer tick cadence, in milliseconds.
pub const BRIDGE_SYNC_TICK_MS: u64 = 100;

/// Default bounded priority-queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Default coalescing window, in milliseconds.
pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 100;

/// Default configuration directory path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/vantage/config";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(MAX_HOT_KEYS > 0 && MAX_HOT_KEYS <= 64);
        assert!(MAX_MAJOR_CYCLE_MS > 0);
        assert!(MAX_READ_RETRIES > 0);
        assert!(HEARTBEAT_TIMEOUT_NS > 0);
        assert!(DEFAULT_QUEUE_CAPACITY.is_power_of_two());
    }
}
