//! HA-supervisor-local error handling, converting into the shared
//! error hierarchy at crate boundaries.

pub use vantage_common::error::{CoreError, CoreResult};

/// Failures local to checkpoint persistence.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint {0} not found")]
    NotFound(uuid::Uuid),

    #[error("checkpoint {0} failed verification: {1}")]
    Invalid(uuid::Uuid, String),

    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<CheckpointError> for CoreError {
    fn from(e: CheckpointError) -> Self {
        match e {
            CheckpointError::NotFound(id) => CoreError::NotFound(id.to_string()),
            other => CoreError::TransientIO(other.to_string()),
        }
    }
}
