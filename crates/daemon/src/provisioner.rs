// Logging provisioner
// Scale intents are written to the log for an operator or an external
// orchestrator to act on; workers then join or leave over worker.add.v1 /
// worker.remove.v1.

use async_trait::async_trait;
use infergate_core::domain::{QueueId, WorkerId};
use infergate_core::port::{ProvisionError, Provisioner};
use tracing::info;

pub struct LogProvisioner;

#[async_trait]
impl Provisioner for LogProvisioner {
    async fn scale_up(&self, queue_id: Option<&QueueId>, count: u32) -> Result<(), ProvisionError> {
        info!(queue_id = ?queue_id, count, "Scale-up requested");
        Ok(())
    }

    async fn retire(&self, worker_id: &WorkerId) -> Result<(), ProvisionError> {
        info!(worker_id = %worker_id, "Worker retirement requested");
        Ok(())
    }
}
