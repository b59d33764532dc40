// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid request state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Request already queued or in flight: {0}")]
    DuplicateRequest(String),

    #[error("Unknown queue type: {0}")]
    UnknownQueueType(String),

    #[error("Unknown worker status: {0}")]
    UnknownWorkerStatus(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
