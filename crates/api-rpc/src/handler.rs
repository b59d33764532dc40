//! RPC Method Handlers
//!
//! Thin translation between RPC types and `QueueManager` calls.

use crate::error::to_rpc_error;
use crate::types::{
    AddWorkerRequest, CompleteRequest, CompleteResponse, CreateQueueRequest,
    CreateQueueResponse, EnqueueRequest, EnqueueResponse, NextRequestRequest,
    NextRequestResponse, QueueStatsRequest, QueueStatsResponse, RemoveWorkerRequest,
    RemoveWorkerResponse, SystemStatsResponse, WorkerStatusRequest,
};
use infergate_core::application::constants::DEFAULT_QUEUE;
use infergate_core::application::{EnqueueOutcome, QueueManager};
use infergate_core::domain::{Request, WorkerInfo};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    manager: Arc<QueueManager>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(manager: Arc<QueueManager>) -> Self {
        Self {
            manager,
            start_time: Instant::now(),
        }
    }

    /// queue.create.v1
    pub async fn create_queue(
        &self,
        params: CreateQueueRequest,
    ) -> Result<CreateQueueResponse, ErrorObjectOwned> {
        let config = self.manager.config();
        let queue_type = params.queue_type.unwrap_or(config.default_queue_type);
        let capacity = params.capacity.unwrap_or(config.default_queue_capacity);

        self.manager
            .create_queue(params.queue_id.clone(), queue_type, capacity)
            .map_err(to_rpc_error)?;

        Ok(CreateQueueResponse {
            queue_id: params.queue_id,
            queue_type,
            capacity,
        })
    }

    /// queue.enqueue.v1
    pub async fn enqueue(&self, params: EnqueueRequest) -> Result<EnqueueResponse, ErrorObjectOwned> {
        let request = match params.request_id {
            Some(id) => Request::new(id, params.priority),
            None => self.manager.new_request(params.priority),
        };
        let request = params
            .tags
            .into_iter()
            .fold(request.with_payload(params.payload), |r, (k, v)| {
                r.with_tag(k, v)
            });
        let request_id = request.id.clone();

        let outcome = self
            .manager
            .enqueue(&params.queue_id, request)
            .map_err(to_rpc_error)?;

        let accepted = match outcome {
            EnqueueOutcome::Accepted => true,
            EnqueueOutcome::Rejected(_) => {
                warn!(
                    queue_id = %params.queue_id,
                    request_id = %request_id,
                    "Enqueue rejected over RPC: queue full"
                );
                false
            }
        };

        Ok(EnqueueResponse {
            request_id,
            queue_id: params.queue_id,
            accepted,
        })
    }

    /// queue.stats.v1
    pub async fn queue_stats(
        &self,
        params: QueueStatsRequest,
    ) -> Result<QueueStatsResponse, ErrorObjectOwned> {
        self.manager
            .queue_stats(&params.queue_id)
            .map_err(to_rpc_error)
    }

    /// worker.add.v1
    pub async fn add_worker(&self, params: AddWorkerRequest) -> Result<WorkerInfo, ErrorObjectOwned> {
        let queue_id = params
            .queue_id
            .unwrap_or_else(|| DEFAULT_QUEUE.to_string());
        self.manager
            .add_worker(
                params.worker_id,
                params.provider,
                params.model,
                params.max_concurrent,
                queue_id,
            )
            .map_err(to_rpc_error)
    }

    /// worker.remove.v1
    pub async fn remove_worker(
        &self,
        params: RemoveWorkerRequest,
    ) -> Result<RemoveWorkerResponse, ErrorObjectOwned> {
        let worker = self
            .manager
            .remove_worker(&params.worker_id)
            .map_err(to_rpc_error)?;

        Ok(RemoveWorkerResponse {
            worker_id: worker.id,
            processed_count: worker.processed_count,
        })
    }

    /// worker.next.v1
    pub async fn next_request(
        &self,
        params: NextRequestRequest,
    ) -> Result<NextRequestResponse, ErrorObjectOwned> {
        let request = self
            .manager
            .next_request(&params.worker_id)
            .map_err(to_rpc_error)?;

        Ok(NextRequestResponse {
            found: request.is_some(),
            request,
        })
    }

    /// worker.complete.v1
    pub async fn complete(
        &self,
        params: CompleteRequest,
    ) -> Result<CompleteResponse, ErrorObjectOwned> {
        let applied = self
            .manager
            .complete(
                &params.worker_id,
                &params.request_id,
                params.success,
                params.processing_time_ms,
            )
            .map_err(to_rpc_error)?;

        Ok(CompleteResponse {
            request_id: params.request_id,
            applied,
        })
    }

    /// worker.status.v1
    pub async fn set_worker_status(
        &self,
        params: WorkerStatusRequest,
    ) -> Result<WorkerInfo, ErrorObjectOwned> {
        self.manager
            .set_worker_status(&params.worker_id, params.status)
            .map_err(to_rpc_error)
    }

    /// system.stats.v1
    pub async fn system_stats(&self) -> Result<SystemStatsResponse, ErrorObjectOwned> {
        Ok(SystemStatsResponse {
            stats: self.manager.system_stats(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: infergate_core::VERSION.to_string(),
        })
    }
}
