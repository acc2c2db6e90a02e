//! The shared error hierarchy: one typed kind per failure class,
//! used across crate boundaries so callers match on a stable variant
//! instead of re-parsing messages.

use thiserror::Error;

/// A failure kind common to the whole runtime.
///
/// Individual crates may keep a narrower local error type (e.g. the
/// shared-memory crate's own `ShmError`) and convert into this one at
/// the boundary where a caller needs the cross-cutting view.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A requested key, checkpoint, or policy does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A store operation observed a type different from the one the
    /// key was first written with.
    #[error("type mismatch on `{key}`: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A bounded structure (hot-key cache, schedule major cycle) was
    /// asked to exceed its fixed capacity.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A policy failed its own validation rules.
    #[error("policy invalid: {0}")]
    PolicyInvalid(String),

    /// A state machine rejected a transition.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// An I/O operation failed in a way that may succeed on retry
    /// (shared-memory attach before the peer is up, checkpoint save).
    #[error("transient I/O error: {0}")]
    TransientIO(String),

    /// A recorded late wakeup. This is carried as a value, not raised
    /// as a propagating error — the variant exists so metrics and
    /// logs can classify it uniformly.
    #[error("deadline miss: {actual_ns}ns > {budget_ns}ns budget")]
    Deadline { actual_ns: i64, budget_ns: i64 },

    /// A peer's heartbeat has not been observed within the timeout.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),
}

/// Convenience alias used throughout the workspace.
pub type CoreResult<T> = Result<T, CoreError>;
