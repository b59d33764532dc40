//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP on a local TCP port.

use crate::handler::RpcHandler;
use crate::types::{
    AddWorkerRequest, CompleteRequest, CreateQueueRequest, EnqueueRequest, NextRequestRequest,
    QueueStatsRequest, RemoveWorkerRequest, WorkerStatusRequest,
};
use infergate_core::application::QueueManager;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9630;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    /// 0 picks a free port (see the address returned by `start`)
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, manager: Arc<QueueManager>) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(manager)),
        }
    }

    /// Bind and start serving. Returns the bound address and the server handle.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.module()?;

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, server.start(module)))
    }

    fn module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("queue.create.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CreateQueueRequest = params.parse()?;
                    handler.create_queue(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.enqueue.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnqueueRequest = params.parse()?;
                    handler.enqueue(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.stats.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: QueueStatsRequest = params.parse()?;
                    handler.queue_stats(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("worker.add.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: AddWorkerRequest = params.parse()?;
                    handler.add_worker(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("worker.remove.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RemoveWorkerRequest = params.parse()?;
                    handler.remove_worker(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("worker.next.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: NextRequestRequest = params.parse()?;
                    handler.next_request(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("worker.complete.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CompleteRequest = params.parse()?;
                    handler.complete(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("worker.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: WorkerStatusRequest = params.parse()?;
                    handler.set_worker_status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // No params
        let handler = self.handler.clone();
        module
            .register_async_method("system.stats.v1", move |_, _, _| {
                let handler = handler.clone();
                async move { handler.system_stats().await }
            })
            .map_err(|e| e.to_string())?;

        Ok(module)
    }
}
