//! JSON-RPC round trip over HTTP
//!
//! Starts the real server on an ephemeral port and drives it with the
//! jsonrpsee HTTP client.

use std::sync::Arc;
use std::time::Duration;

use infergate_api_rpc::error::code;
use infergate_api_rpc::types::{
    CompleteResponse, CreateQueueResponse, EnqueueResponse, NextRequestResponse,
    QueueStatsResponse, RemoveWorkerResponse, SystemStatsResponse,
};
use infergate_api_rpc::{RpcServer, RpcServerConfig};
use infergate_core::application::{QueueManager, SchedulerConfig};
use infergate_core::domain::{QueueType, WorkerInfo, WorkerStatus};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::ClientError;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::server::ServerHandle;
use serde_json::json;

async fn start() -> (HttpClient, ServerHandle) {
    let manager = Arc::new(QueueManager::with_system_providers(SchedulerConfig::default()));
    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (addr, handle) = RpcServer::new(config, manager).start().await.unwrap();

    let client = HttpClientBuilder::default()
        .request_timeout(Duration::from_secs(5))
        .build(format!("http://{}", addr))
        .unwrap();
    (client, handle)
}

fn params(value: serde_json::Value) -> ObjectParams {
    let mut params = ObjectParams::new();
    if let serde_json::Value::Object(map) = value {
        for (k, v) in map {
            params.insert(&k, v).unwrap();
        }
    }
    params
}

#[tokio::test]
async fn test_full_request_lifecycle_over_rpc() {
    let (client, handle) = start().await;

    let created: CreateQueueResponse = client
        .request(
            "queue.create.v1",
            params(json!({"queue_id": "chat", "queue_type": "priority", "capacity": 10})),
        )
        .await
        .unwrap();
    assert_eq!(created.queue_type, QueueType::Priority);

    let worker: WorkerInfo = client
        .request(
            "worker.add.v1",
            params(json!({
                "worker_id": "gpu-1",
                "provider": "local",
                "model": "llama-70b",
                "max_concurrent": 1,
                "queue_id": "chat"
            })),
        )
        .await
        .unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);

    let low: EnqueueResponse = client
        .request(
            "queue.enqueue.v1",
            params(json!({"queue_id": "chat", "request_id": "low", "priority": 2})),
        )
        .await
        .unwrap();
    assert!(low.accepted);

    let high: EnqueueResponse = client
        .request(
            "queue.enqueue.v1",
            params(json!({
                "queue_id": "chat",
                "priority": 8,
                "payload": {"prompt": "hello"},
                "tags": {"tenant": "acme"}
            })),
        )
        .await
        .unwrap();
    assert!(high.accepted);
    assert!(!high.request_id.is_empty());

    let next: NextRequestResponse = client
        .request("worker.next.v1", params(json!({"worker_id": "gpu-1"})))
        .await
        .unwrap();
    assert!(next.found);
    let request = next.request.unwrap();
    assert_eq!(request.id, high.request_id);
    assert_eq!(request.payload["prompt"], "hello");

    let empty: NextRequestResponse = client
        .request("worker.next.v1", params(json!({"worker_id": "gpu-1"})))
        .await
        .unwrap();
    assert!(!empty.found);
    assert!(empty.request.is_none());

    let done: CompleteResponse = client
        .request(
            "worker.complete.v1",
            params(json!({"worker_id": "gpu-1", "request_id": request.id, "success": true})),
        )
        .await
        .unwrap();
    assert!(done.applied);

    let again: CompleteResponse = client
        .request(
            "worker.complete.v1",
            params(json!({"worker_id": "gpu-1", "request_id": request.id, "success": true})),
        )
        .await
        .unwrap();
    assert!(!again.applied);

    let stats: QueueStatsResponse = client
        .request("queue.stats.v1", params(json!({"queue_id": "chat"})))
        .await
        .unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.completed, 1);

    let system: SystemStatsResponse = client.request("system.stats.v1", rpc_params![]).await.unwrap();
    assert_eq!(system.stats.worker_count, 1);
    assert_eq!(system.stats.total_pending, 1);
    assert_eq!(system.version, infergate_core::VERSION);

    let removed: RemoveWorkerResponse = client
        .request("worker.remove.v1", params(json!({"worker_id": "gpu-1"})))
        .await
        .unwrap();
    assert_eq!(removed.processed_count, 1);

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_rpc_error_codes() {
    let (client, handle) = start().await;

    let err = client
        .request::<QueueStatsResponse, _>("queue.stats.v1", params(json!({"queue_id": "nope"})))
        .await
        .unwrap_err();
    match err {
        ClientError::Call(obj) => assert_eq!(obj.code(), code::NOT_FOUND),
        other => panic!("unexpected error: {:?}", other),
    }

    client
        .request::<CreateQueueResponse, _>("queue.create.v1", params(json!({"queue_id": "q"})))
        .await
        .unwrap();
    let err = client
        .request::<CreateQueueResponse, _>("queue.create.v1", params(json!({"queue_id": "q"})))
        .await
        .unwrap_err();
    match err {
        ClientError::Call(obj) => assert_eq!(obj.code(), code::CONFLICT),
        other => panic!("unexpected error: {:?}", other),
    }

    let err = client
        .request::<WorkerInfo, _>(
            "worker.status.v1",
            params(json!({"worker_id": "ghost", "status": "MAINTENANCE"})),
        )
        .await
        .unwrap_err();
    match err {
        ClientError::Call(obj) => assert_eq!(obj.code(), code::NOT_FOUND),
        other => panic!("unexpected error: {:?}", other),
    }

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_full_queue_is_not_an_error() {
    let (client, handle) = start().await;

    client
        .request::<CreateQueueResponse, _>(
            "queue.create.v1",
            params(json!({"queue_id": "tiny", "capacity": 1})),
        )
        .await
        .unwrap();

    let first: EnqueueResponse = client
        .request("queue.enqueue.v1", params(json!({"queue_id": "tiny", "priority": 5})))
        .await
        .unwrap();
    let second: EnqueueResponse = client
        .request("queue.enqueue.v1", params(json!({"queue_id": "tiny", "priority": 9})))
        .await
        .unwrap();

    assert!(first.accepted);
    assert!(!second.accepted);

    handle.stop().unwrap();
}
