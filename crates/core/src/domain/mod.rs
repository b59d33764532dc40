// Domain Layer - Requests, workers and queue configuration

pub mod error;
pub mod queue;
pub mod request;
pub mod worker;

// Re-exports
pub use error::DomainError;
pub use queue::{QueueConfig, QueueId, QueueType};
pub use request::{Priority, PriorityTier, Request, RequestId, RequestStatus, TIER_COUNT};
pub use worker::{WorkerId, WorkerInfo, WorkerStatus};
