//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results. Stats and worker snapshots reuse
//! the core types directly.

use infergate_core::application::{QueueStats, SystemStats};
use infergate_core::domain::{Priority, QueueType, Request, WorkerStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// queue.create.v1 - Create a named queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    pub queue_id: String,
    /// Defaults to the scheduler's default queue type
    #[serde(default)]
    pub queue_type: Option<QueueType>,
    /// Defaults to the scheduler's default capacity
    #[serde(default)]
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueResponse {
    pub queue_id: String,
    pub queue_type: QueueType,
    pub capacity: usize,
}

/// queue.enqueue.v1 - Submit an inference request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub queue_id: String,
    /// Caller-supplied ID; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// `accepted: false` means the queue was full; nothing was stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub request_id: String,
    pub queue_id: String,
    pub accepted: bool,
}

/// queue.stats.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatsRequest {
    pub queue_id: String,
}

pub type QueueStatsResponse = QueueStats;

/// worker.add.v1 - Register a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddWorkerRequest {
    pub worker_id: String,
    pub provider: String,
    pub model: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
    /// Defaults to the `default` queue
    #[serde(default)]
    pub queue_id: Option<String>,
}

fn default_max_concurrent() -> u32 {
    1
}

/// worker.remove.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveWorkerRequest {
    pub worker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveWorkerResponse {
    pub worker_id: String,
    pub processed_count: u64,
}

/// worker.next.v1 - Pull the next request for a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextRequestRequest {
    pub worker_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextRequestResponse {
    pub found: bool,
    pub request: Option<Request>,
}

/// worker.complete.v1 - Report a finished request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub worker_id: String,
    pub request_id: String,
    pub success: bool,
    #[serde(default)]
    pub processing_time_ms: Option<f64>,
}

/// `applied: false` for duplicate or unknown completions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub request_id: String,
    pub applied: bool,
}

/// worker.status.v1 - External status signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusRequest {
    pub worker_id: String,
    pub status: WorkerStatus,
}

/// system.stats.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatsResponse {
    #[serde(flatten)]
    pub stats: SystemStats,
    pub uptime_seconds: u64,
    pub version: String,
}
