// Provisioning Port
// The scheduler decides *that* capacity should change; a provisioner makes it happen
// (starting/stopping worker processes, then calling add_worker/remove_worker).

use crate::domain::{QueueId, WorkerId};
use async_trait::async_trait;
use thiserror::Error;

/// Provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Provisioning backend unavailable: {0}")]
    Unavailable(String),

    #[error("Provisioning request rejected: {0}")]
    Rejected(String),
}

/// Receiver of scale intents
///
/// Implementations:
/// - LogProvisioner (daemon): records intents in the log for an operator or
///   an external orchestrator to act on
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Request `count` additional workers, optionally for a specific queue
    async fn scale_up(&self, queue_id: Option<&QueueId>, count: u32) -> Result<(), ProvisionError>;

    /// Request that a specific idle worker be stopped and deregistered
    async fn retire(&self, worker_id: &WorkerId) -> Result<(), ProvisionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Intent received by the mock
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ProvisionEvent {
        ScaleUp { queue_id: Option<QueueId>, count: u32 },
        Retire { worker_id: WorkerId },
    }

    /// Records every intent; optionally rejects them all
    pub struct RecordingProvisioner {
        events: Mutex<Vec<ProvisionEvent>>,
        reject: bool,
    }

    impl RecordingProvisioner {
        pub fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                reject: false,
            }
        }

        pub fn new_rejecting() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                reject: true,
            }
        }

        pub fn events(&self) -> Vec<ProvisionEvent> {
            self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
        }

        fn record(&self, event: ProvisionEvent) -> Result<(), ProvisionError> {
            self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(event);
            if self.reject {
                return Err(ProvisionError::Rejected("mock rejects all intents".to_string()));
            }
            Ok(())
        }
    }

    impl Default for RecordingProvisioner {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Provisioner for RecordingProvisioner {
        async fn scale_up(
            &self,
            queue_id: Option<&QueueId>,
            count: u32,
        ) -> Result<(), ProvisionError> {
            self.record(ProvisionEvent::ScaleUp {
                queue_id: queue_id.cloned(),
                count,
            })
        }

        async fn retire(&self, worker_id: &WorkerId) -> Result<(), ProvisionError> {
            self.record(ProvisionEvent::Retire {
                worker_id: worker_id.clone(),
            })
        }
    }
}
